use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use notification_cell::router::notification_routes;
use shared_config::AppConfig;

async fn health(config: Arc<AppConfig>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "database_configured": config.is_configured(),
        "sms_configured": config.is_sms_configured(),
        "service_role_configured": config.has_service_role()
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let health_state = state.clone();

    Router::new()
        .route("/", get(|| async { "MediNexus API is running!" }))
        .route("/health", get(move || health(health_state.clone())))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/notifications", notification_routes(state))
}
