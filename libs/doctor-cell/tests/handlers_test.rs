use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Datelike, Duration, NaiveTime, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::handlers::*;
use doctor_cell::models::CreateAvailabilityRequest;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn config_for(mock_server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_mock_server(&mock_server.uri()).to_arc()
}

async fn mount_doctor(mock_server: &MockServer, doctor_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(doctor_id, "Asha", "Mehta", "cardiology")
        ])))
        .mount(mock_server)
        .await;
}

fn every_day_nine_to_ten(doctor_id: &str) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = (0..7)
        .map(|day| MockSupabaseResponses::availability_slot_response(doctor_id, day, "09:00:00", "10:00:00"))
        .collect();
    json!(rows)
}

#[tokio::test]
async fn availability_lists_template_and_open_slots() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    mount_doctor(&mock_server, &doctor.id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(every_day_nine_to_ten(&doctor.id)))
        .mount(&mock_server)
        .await;

    let today = Utc::now().date_naive();
    let booked_start = today.and_time(NaiveTime::from_hms_opt(9, 30, 0).unwrap()).and_utc();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(scheduled,in_progress)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "start_time": booked_start.to_rfc3339(),
            "end_time": (booked_start + Duration::minutes(30)).to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let result = get_doctor_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body["doctor_name"], "Dr. Asha Mehta");
    assert_eq!(body["specialization"], "Cardiology");
    assert_eq!(body["weekly_availability"].as_array().unwrap().len(), 7);
    assert_eq!(body["weekly_availability"][0]["day_name"], "Monday");
    assert_eq!(body["weekly_availability"][0]["start_time"], "09:00");
    assert_eq!(body["booked_slots"].as_array().unwrap().len(), 1);

    let open = body["open_slots"].as_array().unwrap();
    assert_eq!(open.len(), 7);
    assert_eq!(open[0]["duration_minutes"], 30);
    assert_eq!(open[1]["duration_minutes"], 60);
}

#[tokio::test]
async fn duplicated_template_rows_are_reported_once() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    mount_doctor(&mock_server, &doctor.id).await;

    let weekday = Utc::now().date_naive().weekday().num_days_from_monday();
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_slot_response(&doctor.id, weekday, "09:00:00", "10:00:00"),
            MockSupabaseResponses::availability_slot_response(&doctor.id, weekday, "09:00:00", "10:00:00"),
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let Json(body) = get_doctor_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
    )
    .await
    .unwrap();

    assert_eq!(body["weekly_availability"].as_array().unwrap().len(), 2);
    assert_eq!(body["open_slots"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn availability_of_unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_doctor_availability(
        State(config_for(&mock_server)),
        Path(uuid::Uuid::new_v4()),
        auth_header(),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn search_passes_filters_to_storage() {
    let mock_server = MockServer::start().await;
    let doctor_id = uuid::Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(query_param("specialization", "eq.cardiology"))
        .and(query_param("languages_spoken", "ilike.*Hindi*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor_id, "Asha", "Mehta", "cardiology")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = DoctorSearchQuery {
        query: Some("Mehta".to_string()),
        specialization: Some("cardiology".to_string()),
        language: Some("Hindi".to_string()),
    };

    let Json(body) = search_doctors(State(config_for(&mock_server)), auth_header(), Query(query))
        .await
        .unwrap();

    assert_eq!(body["total"], 1);
    assert_eq!(body["doctors"][0]["name"], "Dr. Asha Mehta");
    assert_eq!(body["doctors"][0]["specialization"], "Cardiology");
}

#[tokio::test]
async fn search_rejects_unknown_specialization() {
    let mock_server = MockServer::start().await;

    let query = DoctorSearchQuery {
        query: None,
        specialization: Some("astrology".to_string()),
        language: None,
    };

    let result = search_doctors(State(config_for(&mock_server)), auth_header(), Query(query)).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn doctor_adds_weekly_slot() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("day_of_week", "eq.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::availability_slot_response(&doctor.id, 2, "14:00:00", "16:00:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CreateAvailabilityRequest {
        day_of_week: 2,
        start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        is_available: None,
    };

    let Json(body) = create_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
        Extension(doctor.to_user()),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(body["day_of_week"], 2);
    assert_eq!(body["start_time"], "14:00:00");
}

#[tokio::test]
async fn duplicate_weekly_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": uuid::Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = CreateAvailabilityRequest {
        day_of_week: 0,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        is_available: Some(true),
    };

    let result = create_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
        Extension(doctor.to_user()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn weekly_slot_with_inverted_times_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let request = CreateAvailabilityRequest {
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        is_available: None,
    };

    let result = create_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
        Extension(doctor.to_user()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn weekly_slot_on_day_seven_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let request = CreateAvailabilityRequest {
        day_of_week: 7,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        is_available: None,
    };

    let result = create_availability(
        State(config_for(&mock_server)),
        Path(doctor.uuid()),
        auth_header(),
        Extension(doctor.to_user()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn patient_cannot_manage_doctor_template() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    let request = CreateAvailabilityRequest {
        day_of_week: 0,
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        is_available: None,
    };

    // Even on their own id, a patient is not a doctor.
    let result = create_availability(
        State(config_for(&mock_server)),
        Path(patient.uuid()),
        auth_header(),
        Extension(patient.to_user()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn doctor_cannot_delete_another_doctors_slot() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let other = TestUser::doctor("other@example.com");

    let result = delete_availability(
        State(config_for(&mock_server)),
        Path((other.uuid(), uuid::Uuid::new_v4())),
        auth_header(),
        Extension(doctor.to_user()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn deleting_missing_slot_is_not_found() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = delete_availability(
        State(config_for(&mock_server)),
        Path((doctor.uuid(), uuid::Uuid::new_v4())),
        auth_header(),
        Extension(doctor.to_user()),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn doctor_deletes_own_slot() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let slot = MockSupabaseResponses::availability_slot_response(&doctor.id, 3, "09:00:00", "12:00:00");
    let slot_id = slot["id"].as_str().unwrap().to_string();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let Json(body) = delete_availability(
        State(config_for(&mock_server)),
        Path((doctor.uuid(), slot_id.parse().unwrap())),
        auth_header(),
        Extension(doctor.to_user()),
    )
    .await
    .unwrap();

    assert_eq!(body["success"], true);
}
