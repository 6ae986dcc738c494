use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::models::{AuthSession, LoginRequest, RegisterRequest};
use crate::services::AuthService;

fn header_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    bearer_token(auth_value)
}

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let session = AuthService::new(&config).register(request).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = AuthService::new(&config).login(request).await?;

    Ok(Json(session))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = header_token(&headers)?;
    let user = jwt::validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = header_token(&headers)?;
    let valid = jwt::validate_token(token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let profile = AuthService::new(&config).profile(&user, auth.token()).await?;

    Ok(Json(profile))
}
