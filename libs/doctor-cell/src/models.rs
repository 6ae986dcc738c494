use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR PROFILE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    General,
    Cardiology,
    Dermatology,
    Neurology,
    Pediatrics,
    Psychiatry,
    Orthopedics,
    Gynecology,
    Ophthalmology,
    Ent,
}

impl Specialization {
    pub const ALL: [Specialization; 10] = [
        Specialization::General,
        Specialization::Cardiology,
        Specialization::Dermatology,
        Specialization::Neurology,
        Specialization::Pediatrics,
        Specialization::Psychiatry,
        Specialization::Orthopedics,
        Specialization::Gynecology,
        Specialization::Ophthalmology,
        Specialization::Ent,
    ];

    /// Stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::General => "general",
            Specialization::Cardiology => "cardiology",
            Specialization::Dermatology => "dermatology",
            Specialization::Neurology => "neurology",
            Specialization::Pediatrics => "pediatrics",
            Specialization::Psychiatry => "psychiatry",
            Specialization::Orthopedics => "orthopedics",
            Specialization::Gynecology => "gynecology",
            Specialization::Ophthalmology => "ophthalmology",
            Specialization::Ent => "ent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Specialization::General => "General Physician",
            Specialization::Cardiology => "Cardiology",
            Specialization::Dermatology => "Dermatology",
            Specialization::Neurology => "Neurology",
            Specialization::Pediatrics => "Pediatrics",
            Specialization::Psychiatry => "Psychiatry",
            Specialization::Orthopedics => "Orthopedics",
            Specialization::Gynecology => "Gynecology",
            Specialization::Ophthalmology => "Ophthalmology",
            Specialization::Ent => "ENT Specialist",
        }
    }
}

impl Default for Specialization {
    fn default() -> Self {
        Specialization::General
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Specialization {
    type Err = DoctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Specialization::ALL
            .into_iter()
            .find(|spec| spec.as_str() == wanted)
            .ok_or_else(|| DoctorError::ValidationError(format!("Invalid specialization: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub specialization: Specialization,
    pub license_number: Option<String>,
    #[serde(default)]
    pub experience_years: i32,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub consultation_fee: f64,
    pub languages_spoken: Option<String>,
}

impl DoctorProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {}", self.full_name())
    }
}

/// Public listing shape for search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub experience_years: i32,
    pub languages_spoken: Option<String>,
    pub consultation_fee: f64,
}

impl From<&DoctorProfile> for DoctorSummary {
    fn from(doctor: &DoctorProfile) -> Self {
        Self {
            id: doctor.id,
            name: doctor.display_name(),
            specialization: doctor.specialization.display_name().to_string(),
            experience_years: doctor.experience_years,
            languages_spoken: doctor.languages_spoken.clone(),
            consultation_fee: doctor.consultation_fee,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchFilters {
    pub query: Option<String>,
    pub specialization: Option<Specialization>,
    pub language: Option<String>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// One row of a doctor's recurring weekly template.
/// `day_of_week` runs 0 (Monday) through 6 (Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

pub const DAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

pub fn day_name(day_of_week: i32) -> Option<&'static str> {
    usize::try_from(day_of_week).ok().and_then(|day| DAY_NAMES.get(day).copied())
}

/// A booked appointment's time range, used only to carve open slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    #[serde(alias = "start_time")]
    pub start_datetime: DateTime<Utc>,
    #[serde(alias = "end_time")]
    pub end_datetime: DateTime<Utc>,
}

impl BookedInterval {
    pub fn new(start_datetime: DateTime<Utc>, end_datetime: DateTime<Utc>) -> Self {
        Self { start_datetime, end_datetime }
    }
}

/// A concrete, bookable interval `[start_time, end_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl OpenSlot {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            duration_minutes: (end_time - start_time).num_minutes(),
        }
    }

    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time <= start && end <= self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailabilityEntry {
    pub id: Uuid,
    pub day_of_week: i32,
    pub day_name: String,
    pub start_time: String,
    pub end_time: String,
}

impl From<&WeeklyAvailabilitySlot> for WeeklyAvailabilityEntry {
    fn from(slot: &WeeklyAvailabilitySlot) -> Self {
        Self {
            id: slot.id,
            day_of_week: slot.day_of_week,
            day_name: day_name(slot.day_of_week).unwrap_or("Unknown").to_string(),
            start_time: slot.start_time.format("%H:%M").to_string(),
            end_time: slot.end_time.format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailabilityResponse {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub specialization: String,
    pub weekly_availability: Vec<WeeklyAvailabilityEntry>,
    pub booked_slots: Vec<BookedInterval>,
    pub open_slots: Vec<OpenSlot>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Why a proposed booking was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum BookingRejection {
    #[error("Appointment end time must be after its start time")]
    InvalidRange,

    #[error("Requested time is outside the doctor's available slots")]
    OutsideAvailability,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Availability slot not found")]
    SlotNotFound,

    #[error("Availability slot already exists for this day and time")]
    DuplicateSlot,

    #[error(transparent)]
    Booking(#[from] BookingRejection),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(err: serde_json::Error) -> Self {
        DoctorError::DatabaseError(format!("Failed to parse record: {}", err))
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::SlotNotFound => AppError::NotFound(err.to_string()),
            DoctorError::DuplicateSlot => AppError::Conflict(err.to_string()),
            DoctorError::Booking(rejection) => AppError::BadRequest(rejection.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
