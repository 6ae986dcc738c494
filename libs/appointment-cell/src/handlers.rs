use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{ActorRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::resolve_actor;

use crate::models::{AppointmentError, AppointmentListQuery, BookAppointmentRequest, UpdateStatusRequest};
use crate::services::booking::AppointmentBookingService;

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let role = resolve_actor(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointments = service
        .list_appointments(&user.id, role, &query, auth.token())
        .await?;
    let appointments = service.describe(appointments, auth.token()).await;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

/// Patients book for themselves; the appointment starts as `requested`.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if resolve_actor(&user)? != ActorRole::Patient {
        return Err(AppointmentError::Forbidden("Only patients can book appointments".to_string()).into());
    }

    let appointment = AppointmentBookingService::new(&state)
        .book_appointment(&user.id, request, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .get_participant_appointment(&user.id, appointment_id, auth.token())
        .await?;
    let view = service.describe(vec![appointment], auth.token()).await;

    Ok(Json(json!(view.into_iter().next())))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let status = request
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("status is required".to_string()))?;
    let role = resolve_actor(&user)?;

    let appointment = AppointmentBookingService::new(&state)
        .update_status(&user.id, role, appointment_id, &status, auth.token())
        .await?;

    Ok(Json(json!(appointment)))
}
