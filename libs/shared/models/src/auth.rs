use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub app_metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Account type chosen at registration. Read from `app_metadata` only:
    /// users can rewrite their own `user_metadata`, but not this.
    pub fn user_type(&self) -> Option<&str> {
        self.app_metadata
            .as_ref()
            .and_then(|metadata| metadata.get("user_type"))
            .and_then(|value| value.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Who is acting on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Doctor,
    Patient,
}

impl ActorRole {
    pub const ALL: [ActorRole; 2] = [ActorRole::Doctor, ActorRole::Patient];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Doctor => "doctor",
            ActorRole::Patient => "patient",
        }
    }

    /// Resolve the role of an authenticated user.
    pub fn from_user(user: &User) -> Result<Self, UnknownRole> {
        user.user_type()
            .ok_or_else(|| UnknownRole(String::new()))?
            .parse()
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("User is neither a doctor nor a patient (role: '{0}')")]
pub struct UnknownRole(pub String);

impl FromStr for ActorRole {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(ActorRole::Doctor),
            "patient" => Ok(ActorRole::Patient),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
