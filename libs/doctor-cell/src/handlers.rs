use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{ActorRole, User};
use shared_models::error::AppError;
use shared_utils::extractor::resolve_actor;

use crate::models::{CreateAvailabilityRequest, DoctorSearchFilters, Specialization};
use crate::services::{availability::AvailabilityService, doctor::DoctorService};

#[derive(Debug, Deserialize)]
pub struct DoctorSearchQuery {
    pub query: Option<String>,
    pub specialization: Option<String>,
    pub language: Option<String>,
}

impl DoctorSearchQuery {
    fn into_filters(self) -> Result<DoctorSearchFilters, AppError> {
        let specialization = self
            .specialization
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<Specialization>())
            .transpose()?;

        Ok(DoctorSearchFilters {
            query: self.query,
            specialization,
            language: self.language,
        })
    }
}

/// Only the doctor who owns `doctor_id` may change its weekly template.
fn ensure_owner(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if resolve_actor(user)? != ActorRole::Doctor || user.id != doctor_id.to_string() {
        return Err(AppError::Forbidden(
            "Not authorized to manage availability for this doctor".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let filters = query.into_filters()?;
    let doctor_service = DoctorService::new(&state);

    let doctors = doctor_service.search_doctors(&filters, auth.token()).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    debug!("Availability lookup for doctor {}", doctor_id);

    let doctor = DoctorService::new(&state).get_doctor(&doctor_id.to_string(), token).await?;
    let overview = AvailabilityService::new(&state)
        .get_availability_overview(&doctor, Utc::now().date_naive(), token)
        .await?;

    Ok(Json(json!(overview)))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_owner(&user, doctor_id)?;

    let slot = AvailabilityService::new(&state)
        .create_slot(&doctor_id.to_string(), request, auth.token())
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, slot_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_owner(&user, doctor_id)?;

    AvailabilityService::new(&state)
        .delete_slot(&doctor_id.to_string(), &slot_id.to_string(), auth.token())
        .await?;

    Ok(Json(json!({ "success": true })))
}
