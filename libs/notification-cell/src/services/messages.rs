//! SMS and in-app message bodies. Pure string formatting, no I/O.

use shared_models::auth::ActorRole;

use crate::models::AppointmentDetails;

const LOGIN_BEFORE: &str = "Please login to MediNexus 10 minutes before your appointment time.";

pub fn confirmation_message(details: &AppointmentDetails) -> String {
    format!(
        "Hello {}, your appointment with Dr. {} has been confirmed for {} at {}. {}",
        details.patient_name, details.doctor_name, details.date, details.time, LOGIN_BEFORE
    )
}

pub fn reminder_message(details: &AppointmentDetails) -> String {
    format!(
        "Reminder: Hello {}, you have an appointment with Dr. {} tomorrow at {}. {}",
        details.patient_name, details.doctor_name, details.time, LOGIN_BEFORE
    )
}

/// Sent to the doctor when a patient requests a new appointment.
pub fn request_message(details: &AppointmentDetails) -> String {
    format!(
        "Hello Dr. {}, {} has requested an appointment on {} at {}. Please login to MediNexus to review the request.",
        details.doctor_name, details.patient_name, details.date, details.time
    )
}

/// Cancellation notice addressed to `recipient`, naming the other participant.
pub fn cancellation_message(details: &AppointmentDetails, recipient: ActorRole) -> String {
    let (greeting, counterpart) = match recipient {
        ActorRole::Patient => (details.patient_name.clone(), format!("Dr. {}", details.doctor_name)),
        ActorRole::Doctor => (format!("Dr. {}", details.doctor_name), details.patient_name.clone()),
    };

    format!(
        "Hello {}, your appointment with {} on {} at {} has been cancelled. Please login to MediNexus for details.",
        greeting, counterpart, details.date, details.time
    )
}

pub fn prescription_message(patient_name: &str) -> String {
    format!(
        "Hello {}, your prescription has been updated. Please login to MediNexus to view and download your prescription.",
        patient_name
    )
}

/// Inbox entry for the doctor when a patient requests an appointment.
pub fn in_app_request_message(details: &AppointmentDetails) -> String {
    format!(
        "New appointment request from {} for {} at {}.",
        details.patient_name, details.date, details.time
    )
}

pub fn in_app_confirmation_message(details: &AppointmentDetails) -> String {
    format!(
        "Your appointment with Dr. {} on {} at {} is confirmed.",
        details.doctor_name, details.date, details.time
    )
}

pub fn in_app_cancellation_message(details: &AppointmentDetails, recipient: ActorRole) -> String {
    let counterpart = match recipient {
        ActorRole::Patient => format!("Dr. {}", details.doctor_name),
        ActorRole::Doctor => details.patient_name.clone(),
    };

    format!(
        "Your appointment with {} on {} at {} was cancelled.",
        counterpart, details.date, details.time
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> AppointmentDetails {
        AppointmentDetails {
            patient_name: "Priya Singh".to_string(),
            doctor_name: "Asha Mehta".to_string(),
            date: "2024-01-01".to_string(),
            time: "09:00".to_string(),
        }
    }

    #[test]
    fn confirmation_wording() {
        assert_eq!(
            confirmation_message(&details()),
            "Hello Priya Singh, your appointment with Dr. Asha Mehta has been confirmed for 2024-01-01 at 09:00. \
             Please login to MediNexus 10 minutes before your appointment time."
        );
    }

    #[test]
    fn reminder_mentions_tomorrow_not_date() {
        let body = reminder_message(&details());

        assert!(body.starts_with("Reminder: Hello Priya Singh"));
        assert!(body.contains("tomorrow at 09:00"));
        assert!(!body.contains("2024-01-01"));
    }

    #[test]
    fn cancellation_addresses_each_side() {
        let to_patient = cancellation_message(&details(), ActorRole::Patient);
        let to_doctor = cancellation_message(&details(), ActorRole::Doctor);

        assert!(to_patient.starts_with("Hello Priya Singh, your appointment with Dr. Asha Mehta"));
        assert!(to_doctor.starts_with("Hello Dr. Asha Mehta, your appointment with Priya Singh"));
    }

    #[test]
    fn request_goes_to_doctor() {
        assert!(request_message(&details()).starts_with("Hello Dr. Asha Mehta, Priya Singh has requested"));
    }

    #[test]
    fn prescription_wording() {
        assert_eq!(
            prescription_message("Priya"),
            "Hello Priya, your prescription has been updated. Please login to MediNexus to view and download your prescription."
        );
    }

    #[test]
    fn in_app_cancellation_names_the_other_side() {
        assert_eq!(
            in_app_cancellation_message(&details(), ActorRole::Doctor),
            "Your appointment with Priya Singh on 2024-01-01 at 09:00 was cancelled."
        );
        assert!(in_app_cancellation_message(&details(), ActorRole::Patient).contains("Dr. Asha Mehta"));
        assert!(in_app_request_message(&details()).starts_with("New appointment request from Priya Singh"));
    }
}
