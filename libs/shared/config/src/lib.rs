use std::env;
use tracing::warn;

pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Server credential for writes made on a user's behalf and GoTrue admin calls.
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub twilio_base_url: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, registration and in-app notifications are disabled");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_ACCOUNT_SID not set, using empty value");
                    String::new()
                }),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_AUTH_TOKEN not set, using empty value");
                    String::new()
                }),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_PHONE_NUMBER not set, using empty value");
                    String::new()
                }),
            twilio_base_url: env::var("TWILIO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_TWILIO_BASE_URL.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_sms_configured() {
            warn!("SMS notifications disabled - Twilio credentials missing");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn has_service_role(&self) -> bool {
        !self.supabase_service_role_key.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_phone_number.is_empty()
    }
}
