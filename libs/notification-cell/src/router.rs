use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn notification_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_notifications).post(handlers::create_notification))
        .route("/read-all", put(handlers::mark_all_notifications_read))
        .route("/{notification_id}/read", put(handlers::mark_notification_read))
        .route("/appointment", post(handlers::send_appointment_notification))
        .route("/prescription", post(handlers::send_prescription_notification))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
