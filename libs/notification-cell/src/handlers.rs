use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentNotificationRequest, CreateInAppRequest, NotificationKind, NotificationListQuery,
    PrescriptionNotificationRequest,
};
use crate::services::inbox::InAppNotificationService;
use crate::services::sms::{NotificationDispatcher, SmsNotificationService};

#[axum::debug_handler]
pub async fn send_appointment_notification(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<AppointmentNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let (kind, phone_number, details) = request.into_parts()?;
    debug!("Appointment {:?} notification requested", kind);

    let sms = SmsNotificationService::new(&state);
    let receipt = match kind {
        NotificationKind::Confirmation => sms.send_appointment_confirmation(&phone_number, &details).await?,
        NotificationKind::Reminder => sms.send_appointment_reminder(&phone_number, &details).await?,
    };

    Ok(Json(json!(receipt)))
}

#[axum::debug_handler]
pub async fn send_prescription_notification(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<PrescriptionNotificationRequest>,
) -> Result<Json<Value>, AppError> {
    let (phone_number, patient_name) = request.into_parts()?;

    let receipt = SmsNotificationService::new(&state)
        .send_prescription_notification(&phone_number, &patient_name)
        .await?;

    Ok(Json(json!(receipt)))
}

// ==============================================================================
// IN-APP INBOX
// ==============================================================================

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let notifications = InAppNotificationService::new(&state)
        .list(&user.id, &query, auth.token())
        .await?;
    let unread = notifications.iter().filter(|n| !n.is_read).count();

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len(),
        "unread": unread
    })))
}

/// Store a notification for the caller.
#[axum::debug_handler]
pub async fn create_notification(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateInAppRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a user id".to_string()))?;

    let created = InAppNotificationService::new(&state)
        .create(&request.for_user(user_id)?)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<Arc<AppConfig>>,
    Path(notification_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notification = InAppNotificationService::new(&state)
        .mark_read(&user.id, notification_id, auth.token())
        .await?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let updated = InAppNotificationService::new(&state)
        .mark_all_read(&user.id, auth.token())
        .await?;

    Ok(Json(json!({ "updated": updated })))
}
