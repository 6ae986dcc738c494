use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_models::auth::ActorRole;

use crate::models::{AppointmentDetails, NotificationError, NotificationReceipt};
use crate::services::messages;

/// Outbound patient and doctor notifications.
///
/// Booking code holds one of these behind an `Arc<dyn NotificationDispatcher>`
/// so tests can swap the SMS gateway for a recorder.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_appointment_confirmation(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError>;

    async fn send_appointment_reminder(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError>;

    async fn send_appointment_request(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError>;

    async fn send_appointment_cancellation(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
        recipient: ActorRole,
    ) -> Result<NotificationReceipt, NotificationError>;

    async fn send_prescription_notification(
        &self,
        to_number: &str,
        patient_name: &str,
    ) -> Result<NotificationReceipt, NotificationError>;
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    status: Option<String>,
}

/// SMS delivery through Twilio's Messages REST API.
pub struct SmsNotificationService {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsNotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_phone_number.clone(),
        }
    }

    /// E.164-style numbers: optional '+', then 8 to 15 digits not starting with 0.
    pub fn validate_phone(phone: &str) -> bool {
        Regex::new(r"^\+?[1-9]\d{7,14}$")
            .map(|re| re.is_match(phone))
            .unwrap_or(false)
    }

    async fn send_sms(&self, to_number: &str, body: String) -> Result<NotificationReceipt, NotificationError> {
        let to_number = to_number.trim();

        if self.account_sid.is_empty() || self.auth_token.is_empty() || self.from_number.is_empty() {
            return Err(NotificationError::NotConfigured);
        }

        if !Self::validate_phone(to_number) {
            return Err(NotificationError::InvalidPhoneNumber(to_number.to_string()));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        debug!("Sending SMS to {}", to_number);

        let response = self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to_number),
                ("From", self.from_number.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("SMS gateway error ({}): {}", status, error_text);
            return Err(NotificationError::Provider(format!("{}: {}", status, error_text)));
        }

        let message: TwilioMessage = response.json().await?;
        info!("SMS {} accepted for {}", message.sid, to_number);

        Ok(NotificationReceipt {
            status: message.status.unwrap_or_else(|| "queued".to_string()),
            message_sid: message.sid,
            to: to_number.to_string(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for SmsNotificationService {
    async fn send_appointment_confirmation(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.send_sms(to_number, messages::confirmation_message(details)).await
    }

    async fn send_appointment_reminder(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.send_sms(to_number, messages::reminder_message(details)).await
    }

    async fn send_appointment_request(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.send_sms(to_number, messages::request_message(details)).await
    }

    async fn send_appointment_cancellation(
        &self,
        to_number: &str,
        details: &AppointmentDetails,
        recipient: ActorRole,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.send_sms(to_number, messages::cancellation_message(details, recipient)).await
    }

    async fn send_prescription_notification(
        &self,
        to_number: &str,
        patient_name: &str,
    ) -> Result<NotificationReceipt, NotificationError> {
        self.send_sms(to_number, messages::prescription_message(patient_name)).await
    }
}
