use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BookedInterval, BookingRejection, CreateAvailabilityRequest, DoctorAvailabilityResponse, DoctorError,
    DoctorProfile, OpenSlot, WeeklyAvailabilityEntry, WeeklyAvailabilitySlot,
};
use crate::services::slots::{compute_open_slots, validate_booking_request, DEFAULT_WINDOW_DAYS};

/// Appointment statuses that occupy a doctor's time.
pub const BOOKED_STATUSES: &str = "scheduled,in_progress";

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Available rows of the doctor's weekly template, ordered by day then start.
    pub async fn get_weekly_template(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<WeeklyAvailabilitySlot>, DoctorError> {
        debug!("Fetching weekly availability for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&is_available=eq.true&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let slots = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WeeklyAvailabilitySlot>, _>>()?;

        Ok(slots)
    }

    /// Scheduled or in-progress appointments of the doctor overlapping `[from, to)`.
    pub async fn get_booked_intervals(
        &self,
        doctor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, DoctorError> {
        debug!("Fetching booked intervals for doctor {} between {} and {}", doctor_id, from, to);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.({})&start_time=lt.{}&end_time=gt.{}&select=start_time,end_time&order=start_time.asc",
            doctor_id,
            BOOKED_STATUSES,
            to.to_rfc3339_opts(SecondsFormat::Secs, true),
            from.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let intervals = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedInterval>, _>>()?;

        Ok(intervals)
    }

    /// Open slots for every date in `[window_start, window_end)`, computed
    /// from freshly loaded template and bookings.
    pub async fn get_open_slots(
        &self,
        doctor_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<OpenSlot>, DoctorError> {
        let (_, _, open) = self.resolve(doctor_id, window_start, window_end, auth_token).await?;
        Ok(open)
    }

    /// Load template and bookings for the window and run the resolver.
    /// Identical slots produced by duplicated template rows are reported once.
    async fn resolve(
        &self,
        doctor_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
        auth_token: &str,
    ) -> Result<(Vec<WeeklyAvailabilitySlot>, Vec<BookedInterval>, Vec<OpenSlot>), DoctorError> {
        let template = self.get_weekly_template(doctor_id, auth_token).await?;
        let (from, to) = window_bounds(window_start, window_end);
        let booked = self.get_booked_intervals(doctor_id, from, to, auth_token).await?;

        let mut open: Vec<OpenSlot> =
            compute_open_slots(&template, &booked, window_start, window_end).collect();
        open.dedup();

        Ok((template, booked, open))
    }

    /// Check a proposed appointment interval against the doctor's current
    /// open slots. Reads storage on every call so the decision reflects
    /// bookings made since any earlier lookup.
    pub async fn validate_booking(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        if end <= start {
            return Err(BookingRejection::InvalidRange.into());
        }

        let window_start = start.date_naive();
        let window_end = end.date_naive().succ_opt().unwrap_or(window_start);
        let open = self.get_open_slots(doctor_id, window_start, window_end, auth_token).await?;

        validate_booking_request(start, end, &open).map_err(|rejection| {
            warn!("Rejected booking for doctor {} at {} - {}: {}", doctor_id, start, end, rejection);
            DoctorError::Booking(rejection)
        })
    }

    /// Everything the availability page shows for a doctor, over the
    /// `DEFAULT_WINDOW_DAYS` days starting `today`.
    pub async fn get_availability_overview(
        &self,
        doctor: &DoctorProfile,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<DoctorAvailabilityResponse, DoctorError> {
        let doctor_id = doctor.id.to_string();
        let window_end = today + Duration::days(DEFAULT_WINDOW_DAYS);

        let (template, booked, open_slots) =
            self.resolve(&doctor_id, today, window_end, auth_token).await?;

        Ok(DoctorAvailabilityResponse {
            doctor_id: doctor.id,
            doctor_name: doctor.display_name(),
            specialization: doctor.specialization.display_name().to_string(),
            weekly_availability: template.iter().map(WeeklyAvailabilityEntry::from).collect(),
            booked_slots: booked,
            open_slots,
        })
    }

    /// Add a row to the doctor's weekly template.
    pub async fn create_slot(
        &self,
        doctor_id: &str,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<WeeklyAvailabilitySlot, DoctorError> {
        debug!("Creating availability for doctor: {}", doctor_id);

        if !(0..=6).contains(&request.day_of_week) {
            return Err(DoctorError::ValidationError(
                "Day of week must be between 0 (Monday) and 6 (Sunday)".to_string(),
            ));
        }

        if request.start_time >= request.end_time {
            return Err(DoctorError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }

        let start = request.start_time.format("%H:%M:%S").to_string();
        let end = request.end_time.format("%H:%M:%S").to_string();

        let existing_path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}&start_time=eq.{}&end_time=eq.{}&select=id",
            doctor_id, request.day_of_week, start, end
        );
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &existing_path,
            Some(auth_token),
            None,
        ).await?;

        if !existing.is_empty() {
            warn!("Duplicate availability slot for doctor {} on day {}", doctor_id, request.day_of_week);
            return Err(DoctorError::DuplicateSlot);
        }

        let slot_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": start,
            "end_time": end,
            "is_available": request.is_available.unwrap_or(true)
        });

        let mut result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_availability",
            Some(auth_token),
            Some(slot_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if result.is_empty() {
            return Err(DoctorError::DatabaseError("Failed to create availability".to_string()));
        }

        let slot: WeeklyAvailabilitySlot = serde_json::from_value(result.swap_remove(0))?;
        info!("Availability slot {} created for doctor {}", slot.id, doctor_id);

        Ok(slot)
    }

    /// Remove a template row owned by the doctor.
    pub async fn delete_slot(
        &self,
        doctor_id: &str,
        slot_id: &str,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        debug!("Deleting availability slot {} for doctor {}", slot_id, doctor_id);

        let path = format!(
            "/rest/v1/doctor_availability?id=eq.{}&doctor_id=eq.{}",
            slot_id, doctor_id
        );

        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(DoctorError::SlotNotFound);
        }

        info!("Availability slot {} deleted", slot_id);
        Ok(())
    }
}

/// UTC instants bounding the dates `[window_start, window_end)`.
fn window_bounds(window_start: NaiveDate, window_end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc.from_utc_datetime(&window_start.and_time(NaiveTime::MIN));
    let to = Utc.from_utc_datetime(&window_end.and_time(NaiveTime::MIN));
    (from, to)
}
