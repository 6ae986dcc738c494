use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/search", get(handlers::search_doctors))
        .route(
            "/{doctor_id}/availability",
            get(handlers::get_doctor_availability).post(handlers::create_availability),
        )
        .route(
            "/{doctor_id}/availability/{slot_id}",
            delete(handlers::delete_availability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
