use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_config::AppConfig;
use shared_models::auth::{ActorRole, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pull the raw token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header_value: &str) -> Result<&str, AppError> {
    header_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = bearer_token(auth_value)?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Resolve the acting role once, at the edge. Anything that is neither a
/// doctor nor a patient is refused with 403.
pub fn resolve_actor(user: &User) -> Result<ActorRole, AppError> {
    ActorRole::from_user(user).map_err(|e| AppError::Forbidden(e.to_string()))
}
