use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::DoctorProfile;
use doctor_cell::services::{availability::AvailabilityService, doctor::DoctorService};
use notification_cell::models::{AppointmentDetails, InAppKind, NewInAppNotification};
use notification_cell::services::inbox::InAppNotificationService;
use notification_cell::services::messages;
use notification_cell::services::sms::{NotificationDispatcher, SmsNotificationService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::ActorRole;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus, AppointmentView,
    BookAppointmentRequest, ParticipantName, PatientContact, DEFAULT_APPOINTMENT_MINUTES,
};
use crate::services::lifecycle::{apply_transition, parse_requested_status};

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctor_service: DoctorService,
    availability_service: AvailabilityService,
    notifier: Arc<dyn NotificationDispatcher>,
    inbox: InAppNotificationService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_dispatcher(config, Arc::new(SmsNotificationService::new(config)))
    }

    pub fn with_dispatcher(config: &AppConfig, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctor_service: DoctorService::new(config),
            availability_service: AvailabilityService::new(config),
            notifier,
            inbox: InAppNotificationService::new(config),
        }
    }

    /// Book a new appointment for `patient_id`. The appointment starts out
    /// `requested` and must fit one of the doctor's open slots.
    pub async fn book_appointment(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {}", patient_id, request.doctor_id);

        let start = request.start_time
            .ok_or_else(|| AppointmentError::ValidationError("start_time is required".to_string()))?;
        let end = request.end_time
            .unwrap_or(start + Duration::minutes(DEFAULT_APPOINTMENT_MINUTES));

        let doctor_id = request.doctor_id.to_string();
        let doctor = self.doctor_service.get_doctor(&doctor_id, auth_token).await?;

        // Bookings are re-read here, right before the insert.
        self.availability_service
            .validate_booking(&doctor_id, start, end, auth_token)
            .await?;

        let appointment_data = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "start_time": timestamp(start),
            "end_time": timestamp(end),
            "status": AppointmentStatus::Requested,
            "appointment_type": request.appointment_type,
            "symptoms": request.symptoms,
            "notes": request.notes
        });

        let mut result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create appointment".to_string()));
        }

        let appointment: Appointment = serde_json::from_value(result.swap_remove(0))?;
        info!("Appointment {} requested with doctor {}", appointment.id, doctor_id);

        self.notify_booking_requested(&appointment, &doctor, auth_token).await;

        Ok(appointment)
    }

    /// The caller's appointments, ordered by start time.
    pub async fn list_appointments(
        &self,
        user_id: &str,
        role: ActorRole,
        query: &AppointmentListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for {} {} with {:?}", role, user_id, query);

        let path = list_path(user_id, role, query)?;
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let appointments = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()?;

        Ok(appointments)
    }

    /// Attach participant names for display. Lookups are batched per table
    /// and best effort: a failed one leaves its names empty.
    pub async fn describe(&self, appointments: Vec<Appointment>, auth_token: &str) -> Vec<AppointmentView> {
        let doctor_ids: BTreeSet<Uuid> = appointments.iter().map(|a| a.doctor_id).collect();
        let patient_ids: BTreeSet<Uuid> = appointments.iter().map(|a| a.patient_id).collect();

        let doctors = self
            .participant_names("doctor_profiles", "id,first_name,last_name,specialization", &doctor_ids, auth_token)
            .await;
        let patients = self
            .participant_names("patient_profiles", "id,first_name,last_name", &patient_ids, auth_token)
            .await;

        appointments
            .into_iter()
            .map(|appointment| {
                let doctor = doctors.get(&appointment.doctor_id);
                let patient = patients.get(&appointment.patient_id);

                AppointmentView {
                    patient_name: patient.map(ParticipantName::full_name),
                    doctor_name: doctor.map(|d| format!("Dr. {}", d.full_name())),
                    doctor_specialization: doctor
                        .and_then(ParticipantName::specialization_display)
                        .map(str::to_string),
                    appointment,
                }
            })
            .collect()
    }

    async fn participant_names(
        &self,
        table: &str,
        columns: &str,
        ids: &BTreeSet<Uuid>,
        auth_token: &str,
    ) -> HashMap<Uuid, ParticipantName> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/{}?id=in.({})&select={}", table, id_list, columns);

        match self.supabase.request::<Vec<ParticipantName>>(Method::GET, &path, Some(auth_token), None).await {
            Ok(rows) => rows.into_iter().map(|row| (row.id, row)).collect(),
            Err(e) => {
                warn!("Could not load names from {}: {}", table, e);
                HashMap::new()
            }
        }
    }

    /// Get appointment by ID
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let row = self.supabase
            .find_by_id("appointments", &appointment_id.to_string(), auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        Ok(serde_json::from_value(row)?)
    }

    /// Fetch an appointment the user takes part in. Anyone else gets
    /// `NotFound`, so existence is not leaked.
    pub async fn get_participant_appointment(
        &self,
        user_id: &str,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.is_participant(user_id) {
            warn!("User {} is not a participant of appointment {}", user_id, appointment_id);
            return Err(AppointmentError::NotFound);
        }

        Ok(appointment)
    }

    /// Move an appointment to `requested_status` on behalf of `user_id`
    /// acting as `role`, persist it and notify the other side.
    pub async fn update_status(
        &self,
        user_id: &str,
        role: ActorRole,
        appointment_id: Uuid,
        requested_status: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("{} {} requests {} for appointment {}", role, user_id, requested_status, appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        let acts_on_own = match role {
            ActorRole::Doctor => current.doctor_id.to_string() == user_id,
            ActorRole::Patient => current.patient_id.to_string() == user_id,
        };
        if !acts_on_own {
            warn!("{} {} does not own appointment {}", role, user_id, appointment_id);
            return Err(AppointmentError::NotFound);
        }

        let requested = parse_requested_status(current.status, requested_status)?;
        let updated = apply_transition(&current, role, requested).map_err(|e| {
            warn!("Rejected status change for appointment {}: {}", appointment_id, e);
            e
        })?;

        if updated.status == AppointmentStatus::Scheduled {
            self.availability_service
                .validate_booking(&current.doctor_id.to_string(), current.start_time, current.end_time, auth_token)
                .await?;
        }

        // Guard on the status we read so a concurrent change is not overwritten.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, current.status
        );
        let mut result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({
                "status": updated.status,
                "updated_at": timestamp(Utc::now())
            })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if result.is_empty() {
            return Err(AppointmentError::StatusChanged);
        }

        let persisted: Appointment = serde_json::from_value(result.swap_remove(0))?;
        info!("Appointment {} moved from {} to {} by {}", appointment_id, current.status, persisted.status, role);

        self.notify_status_change(&persisted, role, auth_token).await;

        Ok(persisted)
    }

    // ==========================================================================
    // NOTIFICATIONS (SMS and in-app; failures are logged, never returned)
    // ==========================================================================

    async fn patient_contact(&self, patient_id: Uuid, auth_token: &str) -> Result<PatientContact, AppointmentError> {
        let row = self.supabase
            .find_by_id("patient_profiles", &patient_id.to_string(), auth_token)
            .await?
            .ok_or_else(|| AppointmentError::ValidationError(format!("No profile for patient {}", patient_id)))?;

        Ok(serde_json::from_value(row)?)
    }

    /// Store an inbox entry for `recipient`, linking back to the appointment.
    async fn record_in_app(&self, appointment: &Appointment, recipient: Uuid, message: String) {
        let notification = NewInAppNotification {
            user_id: recipient,
            kind: InAppKind::Appointment,
            message,
            link: Some(format!("/appointments/{}", appointment.id)),
            data: Some(json!({
                "appointment_id": appointment.id,
                "status": appointment.status
            })),
        };

        if let Err(e) = self.inbox.create(&notification).await {
            warn!("Failed to store in-app notice for appointment {}: {}", appointment.id, e);
        }
    }

    async fn notify_booking_requested(&self, appointment: &Appointment, doctor: &DoctorProfile, auth_token: &str) {
        let patient = match self.patient_contact(appointment.patient_id, auth_token).await {
            Ok(patient) => patient,
            Err(e) => {
                warn!("Could not load patient for appointment {} notice: {}", appointment.id, e);
                return;
            }
        };

        let details = appointment_details(appointment, &patient, doctor);
        self.record_in_app(appointment, appointment.doctor_id, messages::in_app_request_message(&details))
            .await;

        let Some(phone) = doctor.phone_number.as_deref() else {
            debug!("Doctor {} has no phone number; skipping request SMS", doctor.id);
            return;
        };

        if let Err(e) = self.notifier.send_appointment_request(phone, &details).await {
            warn!("Failed to notify doctor {} of appointment {}: {}", doctor.id, appointment.id, e);
        }
    }

    async fn notify_status_change(&self, appointment: &Appointment, actor: ActorRole, auth_token: &str) {
        let recipient = match (appointment.status, actor) {
            (AppointmentStatus::Scheduled, _) => ActorRole::Patient,
            (AppointmentStatus::Cancelled, ActorRole::Patient) => ActorRole::Doctor,
            (AppointmentStatus::Cancelled, ActorRole::Doctor) => ActorRole::Patient,
            _ => return,
        };

        let doctor = self.doctor_service.get_doctor(&appointment.doctor_id.to_string(), auth_token).await;
        let patient = self.patient_contact(appointment.patient_id, auth_token).await;
        let (doctor, patient) = match (doctor, patient) {
            (Ok(doctor), Ok(patient)) => (doctor, patient),
            (Err(e), _) => {
                warn!("Could not load doctor for appointment {} notice: {}", appointment.id, e);
                return;
            }
            (_, Err(e)) => {
                warn!("Could not load patient for appointment {} notice: {}", appointment.id, e);
                return;
            }
        };

        let details = appointment_details(appointment, &patient, &doctor);
        let (recipient_id, message) = match recipient {
            ActorRole::Patient if appointment.status == AppointmentStatus::Scheduled => {
                (appointment.patient_id, messages::in_app_confirmation_message(&details))
            }
            ActorRole::Patient => (appointment.patient_id, messages::in_app_cancellation_message(&details, recipient)),
            ActorRole::Doctor => (appointment.doctor_id, messages::in_app_cancellation_message(&details, recipient)),
        };
        self.record_in_app(appointment, recipient_id, message).await;

        let phone = match recipient {
            ActorRole::Patient => patient.phone_number.as_deref(),
            ActorRole::Doctor => doctor.phone_number.as_deref(),
        };
        let Some(phone) = phone else {
            debug!("No phone number for the {} of appointment {}", recipient, appointment.id);
            return;
        };

        let sent = if appointment.status == AppointmentStatus::Scheduled {
            self.notifier.send_appointment_confirmation(phone, &details).await
        } else {
            self.notifier.send_appointment_cancellation(phone, &details, recipient).await
        };

        match sent {
            Ok(receipt) => info!("Notified {} of appointment {} ({})", recipient, appointment.id, receipt.message_sid),
            Err(e) => warn!("Failed to notify {} of appointment {}: {}", recipient, appointment.id, e),
        }
    }
}

fn appointment_details(appointment: &Appointment, patient: &PatientContact, doctor: &DoctorProfile) -> AppointmentDetails {
    AppointmentDetails {
        patient_name: patient.full_name(),
        doctor_name: doctor.full_name(),
        date: appointment.start_time.format("%Y-%m-%d").to_string(),
        time: appointment.start_time.format("%H:%M").to_string(),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn start_of_day(date: NaiveDate) -> String {
    timestamp(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn parse_day(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!("Ignoring unparsable date filter '{}'", value);
            None
        }
    }
}

fn list_path(user_id: &str, role: ActorRole, query: &AppointmentListQuery) -> Result<String, AppointmentError> {
    let owner_column = match role {
        ActorRole::Doctor => "doctor_id",
        ActorRole::Patient => "patient_id",
    };
    let mut query_parts = vec![format!("{}=eq.{}", owner_column, user_id)];

    if let Some(status) = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let status: AppointmentStatus = status
            .parse()
            .map_err(|e: crate::models::UnknownStatus| AppointmentError::ValidationError(e.to_string()))?;
        query_parts.push(format!("status=eq.{}", status));
    }

    if let Some(from) = parse_day(query.date_from.as_deref()) {
        query_parts.push(format!("start_time=gte.{}", start_of_day(from)));
    }

    if let Some(to) = parse_day(query.date_to.as_deref()).and_then(|d| d.succ_opt()) {
        query_parts.push(format!("start_time=lt.{}", start_of_day(to)));
    }

    query_parts.push("order=start_time.asc".to_string());

    Ok(format!("/rest/v1/appointments?{}", query_parts.join("&")))
}
