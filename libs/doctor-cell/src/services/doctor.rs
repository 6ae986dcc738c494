use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorError, DoctorProfile, DoctorSearchFilters, DoctorSummary};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Get doctor by ID
    pub async fn get_doctor(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let row = self.supabase
            .find_by_id("doctor_profiles", doctor_id, auth_token)
            .await?
            .ok_or(DoctorError::NotFound)?;

        Ok(serde_json::from_value(row)?)
    }

    /// Search doctors by name, specialization and spoken language.
    ///
    /// Name and language match case-insensitively on substrings; the
    /// specialization must match exactly.
    pub async fn search_doctors(
        &self,
        filters: &DoctorSearchFilters,
        auth_token: &str,
    ) -> Result<Vec<DoctorSummary>, DoctorError> {
        debug!("Searching doctors with filters: {:?}", filters);

        let path = search_path(filters);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let doctors = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DoctorProfile>, _>>()?;

        Ok(doctors.iter().map(DoctorSummary::from).collect())
    }
}

fn search_path(filters: &DoctorSearchFilters) -> String {
    let mut query_parts = vec!["select=*".to_string()];

    if let Some(query) = filters.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let term = urlencoding::encode(query);
        query_parts.push(format!(
            "or=(first_name.ilike.*{}*,last_name.ilike.*{}*)",
            term, term
        ));
    }

    if let Some(specialization) = filters.specialization {
        query_parts.push(format!("specialization=eq.{}", specialization.as_str()));
    }

    if let Some(language) = filters.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        query_parts.push(format!(
            "languages_spoken=ilike.*{}*",
            urlencoding::encode(language)
        ));
    }

    query_parts.push("order=last_name.asc,first_name.asc".to_string());

    format!("/rest/v1/doctor_profiles?{}", query_parts.join("&"))
}
