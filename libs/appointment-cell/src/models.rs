use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::{BookingRejection, DoctorError, Specialization};
use shared_models::auth::UnknownRole;
use shared_models::error::AppError;

/// Length of an appointment booked without an explicit end time.
pub const DEFAULT_APPOINTMENT_MINUTES: i64 = 30;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    pub video_call_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id.to_string() == user_id || self.doctor_id.to_string() == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Requested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Scheduled,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Position in `ALL`; used to index the transition table.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Requested => "requested",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    Video,
    Chat,
    InPerson,
}

/// The parts of a patient profile notifications need.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientContact {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

impl PatientContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Name columns of a doctor or patient profile, fetched in bulk to label
/// appointment listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantName {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialization: Option<String>,
}

impl ParticipantName {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn specialization_display(&self) -> Option<&'static str> {
        self.specialization
            .as_deref()
            .and_then(|s| s.parse::<Specialization>().ok())
            .map(|s| s.display_name())
    }
}

/// An appointment with its participants' display names alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_specialization: Option<String>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

/// Listing filters. Dates are `YYYY-MM-DD`; `date_to` covers the whole day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// A status change the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot change appointment status from {from} to {requested}")]
    InvalidTransition {
        from: AppointmentStatus,
        requested: String,
    },

    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Booking(#[from] BookingRejection),

    #[error("Appointment status was changed by another request")]
    StatusChanged,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", err))
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Booking(rejection) => AppointmentError::Booking(rejection),
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::Transition(TransitionError::UnknownRole(_)) => {
                AppError::Forbidden(err.to_string())
            }
            AppointmentError::Transition(TransitionError::InvalidTransition { .. })
            | AppointmentError::Booking(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::StatusChanged => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
