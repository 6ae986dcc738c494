use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use doctor_cell::models::Specialization;
use shared_models::auth::ActorRole;
use shared_models::error::AppError;

/// Languages the patient UI is offered in.
pub const SUPPORTED_LANGUAGES: [&str; 3] = ["en", "hi", "pa"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_type: Option<String>,
    pub phone_number: Option<String>,

    // Doctor
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub experience_years: Option<i32>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub languages_spoken: Option<String>,

    // Patient
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub preferred_language: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated registration, ready to be written once the auth user exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: ActorRole,
    profile: Value,
}

impl Registration {
    pub fn profile_table(&self) -> &'static str {
        profile_table(self.role)
    }

    /// The role profile row, keyed by the auth user id.
    pub fn profile_row(&self, user_id: &str) -> Value {
        let mut row = self.profile.clone();
        row["id"] = json!(user_id);
        row["first_name"] = json!(self.first_name);
        row["last_name"] = json!(self.last_name);
        row
    }

    /// Display fields for GoTrue `user_metadata`. Users can edit these.
    pub fn metadata(&self) -> Value {
        json!({
            "first_name": self.first_name,
            "last_name": self.last_name
        })
    }

    /// Written with the service role; `user_type` here is what requests are
    /// authorized against.
    pub fn app_metadata(&self) -> Value {
        json!({ "user_type": self.role })
    }
}

pub fn profile_table(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Doctor => "doctor_profiles",
        ActorRole::Patient => "patient_profiles",
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, AuthError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingField(field))
}

impl RegisterRequest {
    /// Check everything before any account is created, so a bad doctor
    /// profile never leaves an orphaned auth user behind.
    pub fn validate(self) -> Result<Registration, AuthError> {
        let email = required(self.email, "email")?;
        let password = required(self.password, "password")?;

        let role = self
            .user_type
            .as_deref()
            .and_then(|t| t.parse::<ActorRole>().ok())
            .ok_or(AuthError::InvalidUserType)?;

        let profile = match role {
            ActorRole::Doctor => {
                let specialization = required(self.specialization, "specialization")?;
                let specialization: Specialization = specialization
                    .parse()
                    .map_err(|_| AuthError::Validation(format!("Invalid specialization: {}", specialization)))?;
                let license_number = required(self.license_number, "license_number")?;
                let experience_years = self.experience_years.ok_or(AuthError::MissingField("experience_years"))?;
                if experience_years < 0 {
                    return Err(AuthError::Validation("experience_years cannot be negative".to_string()));
                }
                let phone_number = required(self.phone_number, "phone_number")?;

                json!({
                    "specialization": specialization.as_str(),
                    "license_number": license_number,
                    "experience_years": experience_years,
                    "phone_number": phone_number,
                    "bio": self.bio.unwrap_or_default(),
                    "consultation_fee": self.consultation_fee.unwrap_or(0.0),
                    "languages_spoken": self.languages_spoken.unwrap_or_default()
                })
            }
            ActorRole::Patient => {
                let preferred_language = self.preferred_language.unwrap_or_else(|| "en".to_string());
                if !SUPPORTED_LANGUAGES.contains(&preferred_language.as_str()) {
                    return Err(AuthError::Validation(format!(
                        "preferred_language must be one of {}",
                        SUPPORTED_LANGUAGES.join(", ")
                    )));
                }

                json!({
                    "phone_number": self.phone_number.unwrap_or_default(),
                    "address": self.address.unwrap_or_default(),
                    "date_of_birth": self.date_of_birth,
                    "preferred_language": preferred_language,
                    "emergency_contact_name": self.emergency_contact_name.unwrap_or_default(),
                    "emergency_contact_number": self.emergency_contact_number.unwrap_or_default()
                })
            }
        };

        Ok(Registration {
            email,
            password,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            role,
            profile,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_type: Option<ActorRole>,
    pub is_doctor: bool,
    pub is_patient: bool,
}

impl UserSummary {
    /// Build from a GoTrue user object. The role is taken from
    /// `app_metadata`, names from `user_metadata`.
    pub fn from_auth_user(user: &Value) -> Option<Self> {
        let id = user.get("id")?.as_str()?.to_string();
        let metadata = user.get("user_metadata");
        let text = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let user_type = user
            .get("app_metadata")
            .and_then(|m| m.get("user_type"))
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<ActorRole>().ok());

        Some(Self {
            id,
            email: user.get("email").and_then(Value::as_str).map(str::to_string),
            first_name: text("first_name"),
            last_name: text("last_name"),
            user_type,
            is_doctor: user_type == Some(ActorRole::Doctor),
            is_patient: user_type == Some(ActorRole::Patient),
        })
    }

    pub fn with_role(self, role: ActorRole) -> Self {
        Self {
            user_type: Some(role),
            is_doctor: role == ActorRole::Doctor,
            is_patient: role == ActorRole::Patient,
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub tokens: SessionTokens,
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid user type. Must be either \"doctor\" or \"patient\"")]
    InvalidUserType,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Please provide both email and password")]
    MissingCredentials,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Registration failed: {0}")]
    SignUp(String),

    #[error("Unexpected auth response: {0}")]
    UnexpectedResponse(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingField(_)
            | AuthError::InvalidUserType
            | AuthError::MissingCredentials
            | AuthError::SignUp(_) => AppError::BadRequest(err.to_string()),
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::UnexpectedResponse(_) => AppError::ExternalService(err.to_string()),
            AuthError::Database(msg) => AppError::Database(msg),
            AuthError::NotConfigured(_) => AppError::Internal(err.to_string()),
        }
    }
}
