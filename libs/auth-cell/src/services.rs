use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{ActorRole, User};

use crate::models::{
    profile_table, AuthError, AuthSession, LoginRequest, RegisterRequest, Registration, SessionTokens,
    UserSummary,
};

/// Account flows over GoTrue plus the role profile tables.
pub struct AuthService {
    supabase: SupabaseClient,
    service_role: bool,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_role: config.has_service_role(),
        }
    }

    /// Sign up, then write the role claim and the profile row with the
    /// service role. Sign-up hands back no session while email confirmation
    /// is on, so nothing here may depend on the caller's token. If either
    /// write fails the auth user is removed again.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AuthError> {
        let registration = request.validate()?;
        if !self.service_role {
            return Err(AuthError::NotConfigured("SUPABASE_SERVICE_ROLE_KEY"));
        }
        info!("Registering {} account for {}", registration.role, registration.email);

        let response = self.supabase
            .sign_up(&registration.email, &registration.password, registration.metadata())
            .await
            .map_err(|e| {
                warn!("Sign-up failed for {}: {}", registration.email, e);
                AuthError::SignUp(e.to_string())
            })?;

        // A session comes back only when email confirmation is off.
        let auth_user = response.get("user").unwrap_or(&response);
        let user = UserSummary::from_auth_user(auth_user)
            .ok_or_else(|| AuthError::UnexpectedResponse("sign-up returned no user id".to_string()))?
            .with_role(registration.role);
        let tokens = session_tokens(&response)?;

        let profile = match self.provision(&registration, &user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Registration of {} failed after sign-up: {}", user.id, e);
                self.discard_auth_user(&user.id).await;
                return Err(e);
            }
        };

        info!("Created {} profile for user {}", registration.role, user.id);

        Ok(AuthSession {
            tokens: self.reissue(tokens).await,
            user,
            profile,
        })
    }

    async fn provision(&self, registration: &Registration, user_id: &str) -> Result<Option<Value>, AuthError> {
        self.supabase
            .set_app_metadata(user_id, registration.app_metadata())
            .await
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

        let path = format!("/rest/v1/{}", registration.profile_table());
        let rows: Vec<Value> = self.supabase.admin_request(
            Method::POST,
            &path,
            Some(registration.profile_row(user_id)),
            Some(SupabaseClient::representation_headers()),
        ).await.map_err(|e| AuthError::Database(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn discard_auth_user(&self, user_id: &str) {
        match self.supabase.delete_auth_user(user_id).await {
            Ok(()) => info!("Removed auth user {} after failed registration", user_id),
            Err(e) => warn!("Could not remove auth user {}: {}", user_id, e),
        }
    }

    /// Tokens minted at sign-up predate the role claim. Swap them for fresh
    /// ones; on failure the originals still work once the client refreshes.
    async fn reissue(&self, tokens: SessionTokens) -> SessionTokens {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return tokens;
        };

        let refreshed = match self.supabase.refresh_session(refresh_token).await {
            Ok(response) => session_tokens(&response),
            Err(e) => Err(AuthError::UnexpectedResponse(e.to_string())),
        };

        match refreshed {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Could not refresh the sign-up session: {}", e);
                tokens
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(email), Some(password)) = (non_empty(request.email), non_empty(request.password)) else {
            return Err(AuthError::MissingCredentials);
        };

        let response = self.supabase
            .sign_in_with_password(email.trim(), &password)
            .await
            .map_err(|e| {
                warn!("Sign-in failed for {}: {}", email, e);
                AuthError::InvalidCredentials
            })?;

        let user = response
            .get("user")
            .and_then(UserSummary::from_auth_user)
            .ok_or_else(|| AuthError::UnexpectedResponse("sign-in returned no user".to_string()))?;
        let tokens = session_tokens(&response)?;

        let profile = match (user.user_type, tokens.access_token.as_deref()) {
            (Some(role), Some(token)) => self
                .role_profile(role, &user.id, token)
                .await
                .unwrap_or_else(|e| {
                    warn!("Could not load {} profile for {}: {}", role, user.id, e);
                    None
                }),
            _ => None,
        };

        debug!("User {} signed in", user.id);

        Ok(AuthSession { tokens, user, profile })
    }

    /// GoTrue user record plus the caller's doctor or patient profile.
    pub async fn profile(&self, user: &User, auth_token: &str) -> Result<Value, AuthError> {
        let auth_profile = self.supabase
            .get_user_profile(auth_token)
            .await
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

        let role = ActorRole::from_user(user).ok();
        let profile = match role {
            Some(role) => self.role_profile(role, &user.id, auth_token).await?,
            None => None,
        };

        Ok(json!({
            "user_id": user.id,
            "user_type": role,
            "auth_profile": auth_profile,
            "profile": profile
        }))
    }

    async fn role_profile(&self, role: ActorRole, user_id: &str, auth_token: &str) -> Result<Option<Value>, AuthError> {
        self.supabase
            .find_by_id(profile_table(role), user_id, auth_token)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }
}

fn session_tokens(response: &Value) -> Result<SessionTokens, AuthError> {
    serde_json::from_value(response.clone())
        .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))
}
