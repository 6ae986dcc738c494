use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// MESSAGE INPUTS
// ==============================================================================

/// Names and display strings an appointment SMS is built from.
/// `doctor_name` is the bare name; message bodies add the "Dr." prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub patient_name: String,
    pub doctor_name: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Reminder,
}

impl FromStr for NotificationKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmation" => Ok(NotificationKind::Confirmation),
            "reminder" => Ok(NotificationKind::Reminder),
            other => Err(NotificationError::UnknownType(other.to_string())),
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentNotificationRequest {
    pub notification_type: Option<String>,
    pub phone_number: Option<String>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl AppointmentNotificationRequest {
    /// Split into kind, destination and message details, naming the first
    /// missing field.
    pub fn into_parts(self) -> Result<(NotificationKind, String, AppointmentDetails), NotificationError> {
        let kind = required(self.notification_type, "notification_type")?.parse()?;
        let phone_number = required(self.phone_number, "phone_number")?;

        let details = AppointmentDetails {
            patient_name: required(self.patient_name, "patient_name")?,
            doctor_name: required(self.doctor_name, "doctor_name")?,
            date: required(self.date, "date")?,
            time: required(self.time, "time")?,
        };

        Ok((kind, phone_number, details))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionNotificationRequest {
    pub phone_number: Option<String>,
    pub patient_name: Option<String>,
}

impl PrescriptionNotificationRequest {
    pub fn into_parts(self) -> Result<(String, String), NotificationError> {
        Ok((
            required(self.phone_number, "phone_number")?,
            required(self.patient_name, "patient_name")?,
        ))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, NotificationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(NotificationError::MissingField(field))
}

/// What the SMS gateway reported for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub status: String,
    pub message_sid: String,
    pub to: String,
}

// ==============================================================================
// IN-APP NOTIFICATIONS
// ==============================================================================

pub const DEFAULT_INBOX_LIMIT: u32 = 50;
pub const MAX_INBOX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InAppKind {
    Appointment,
    Chat,
    Alert,
    Success,
    Info,
}

/// A row of the `notifications` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: InAppKind,
    pub message: String,
    pub link: Option<String>,
    pub data: Option<Value>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInAppNotification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: InAppKind,
    pub message: String,
    pub link: Option<String>,
    pub data: Option<Value>,
}

/// Body of `POST /notifications`; the recipient is always the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInAppRequest {
    #[serde(rename = "type")]
    pub kind: InAppKind,
    pub message: String,
    pub link: Option<String>,
    pub data: Option<Value>,
}

impl CreateInAppRequest {
    pub fn for_user(self, user_id: Uuid) -> Result<NewInAppNotification, NotificationError> {
        let message = required(Some(self.message), "message")?;

        Ok(NewInAppNotification {
            user_id,
            kind: self.kind,
            message,
            link: self.link,
            data: self.data,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationListQuery {
    pub limit: Option<u32>,
    pub include_read: Option<bool>,
}

impl NotificationListQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_INBOX_LIMIT).clamp(1, MAX_INBOX_LIMIT)
    }

    pub fn include_read(&self) -> bool {
        self.include_read.unwrap_or(true)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid notification type: {0}")]
    UnknownType(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("SMS gateway is not configured")]
    NotConfigured,

    #[error("SMS provider error: {0}")]
    Provider(String),

    #[error("Notification not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Provider(err.to_string())
    }
}

impl From<anyhow::Error> for NotificationError {
    fn from(err: anyhow::Error) -> Self {
        NotificationError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Database(format!("Failed to parse notification: {}", err))
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MissingField(_)
            | NotificationError::UnknownType(_)
            | NotificationError::InvalidPhoneNumber(_) => AppError::BadRequest(err.to_string()),
            NotificationError::NotConfigured => AppError::Internal(err.to_string()),
            NotificationError::Provider(_) => AppError::ExternalService(err.to_string()),
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Database(msg) => AppError::Database(msg),
        }
    }
}
