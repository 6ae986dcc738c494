use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub twilio_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            twilio_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    /// Point both Supabase and Twilio at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            twilio_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            twilio_account_sid: "ACtest".to_string(),
            twilio_auth_token: "twilio-test-token".to_string(),
            twilio_phone_number: "+15550000000".to_string(),
            twilio_base_url: self.twilio_base_url.clone(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: Some(json!({ "user_type": self.role })),
            app_metadata: Some(json!({ "provider": "email", "user_type": self.role })),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        Self::create_token_with_metadata(
            user,
            secret,
            exp_hours,
            json!({ "provider": "email", "user_type": user.role }),
            json!({ "user_type": user.role }),
        )
    }

    /// A token whose role is only self-declared in `user_metadata`.
    pub fn create_self_declared_token(user: &TestUser, secret: &str) -> String {
        Self::create_token_with_metadata(
            user,
            secret,
            None,
            json!({ "provider": "email" }),
            json!({ "user_type": user.role }),
        )
    }

    pub fn create_token_with_metadata(
        user: &TestUser,
        secret: &str,
        exp_hours: Option<i64>,
        app_metadata: serde_json::Value,
        user_metadata: serde_json::Value,
    ) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": app_metadata,
            "user_metadata": user_metadata,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as PostgREST returns them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_profile_response(doctor_id: &str, first_name: &str, last_name: &str, specialization: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": first_name,
            "last_name": last_name,
            "specialization": specialization,
            "license_number": "MD123456",
            "experience_years": 10,
            "phone_number": "+15551230000",
            "bio": "Experienced physician",
            "consultation_fee": 500.0,
            "languages_spoken": "English, Hindi",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_profile_response(patient_id: &str, first_name: &str, last_name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": first_name,
            "last_name": last_name,
            "phone_number": "+15559870000",
            "address": null,
            "date_of_birth": "1990-01-01",
            "preferred_language": "en",
            "emergency_contact_name": null,
            "emergency_contact_number": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_slot_response(doctor_id: &str, day_of_week: u32, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": start,
            "end_time": end,
            "is_available": true
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        start_time: &str,
        end_time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "start_time": start_time,
            "end_time": end_time,
            "status": status,
            "appointment_type": "video",
            "symptoms": "Persistent cough",
            "notes": null,
            "video_call_id": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
