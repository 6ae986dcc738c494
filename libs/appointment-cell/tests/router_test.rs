use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::{Duration, NaiveTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn send(
    config: &TestConfig,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = appointment_routes(config.to_arc())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn token_for(user: &TestUser, config: &TestConfig) -> String {
    JwtTestUtils::create_test_token(user, &config.jwt_secret, None)
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let config = TestConfig::default();

    let (status, _) = send(&config, "GET", "/", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctors_cannot_book() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doctor@example.com");

    let (status, body) = send(
        &config,
        "POST",
        "/",
        Some(&token_for(&doctor, &config)),
        Some(json!({ "doctor_id": doctor.id, "start_time": "2030-01-07T10:00:00Z" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Only patients"));
}

#[tokio::test]
async fn users_without_a_known_role_are_forbidden() {
    let config = TestConfig::default();
    let admin = TestUser::new("admin@example.com", "admin");

    let (status, _) = send(&config, "GET", "/", Some(&token_for(&admin, &config)), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patient_books_an_open_slot() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor.id, "Asha", "Mehta", "cardiology")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_profile_response(&patient.id, "Priya", "Sharma")
        ])))
        .mount(&mock_server)
        .await;
    let template: Vec<_> = (0..7)
        .map(|day| MockSupabaseResponses::availability_slot_response(&doctor.id, day, "09:00:00", "17:00:00"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(template)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let start = (Utc::now().date_naive() + Duration::days(2))
        .and_time(NaiveTime::from_hms_opt(14, 0, 0).unwrap())
        .and_utc();
    let start_str = start.to_rfc3339_opts(SecondsFormat::Secs, true);
    let end_str = (start + Duration::minutes(30)).to_rfc3339_opts(SecondsFormat::Secs, true);
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &patient.id,
                &doctor.id,
                &start_str,
                &end_str,
                "requested",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/ACtest/Messages.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM1", "status": "queued" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        &config,
        "POST",
        "/",
        Some(&token_for(&patient, &config)),
        Some(json!({ "doctor_id": doctor.id, "start_time": start_str, "symptoms": "Persistent cough" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "requested");
    assert_eq!(body["doctor_id"], doctor.id);
}

#[tokio::test]
async fn status_update_requires_a_status() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doctor@example.com");

    let (status, body) = send(
        &config,
        "PUT",
        &format!("/{}/status", Uuid::new_v4()),
        Some(&token_for(&doctor, &config)),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("status is required"));
}

#[tokio::test]
async fn invalid_transition_is_a_bad_request() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &id.to_string(),
                &patient.id,
                &doctor.id,
                "2030-01-07T10:00:00Z",
                "2030-01-07T10:30:00Z",
                "completed",
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        &config,
        "PUT",
        &format!("/{}/status", id),
        Some(&token_for(&doctor, &config)),
        Some(json!({ "status": "cancelled" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("from completed to cancelled"));
}

#[tokio::test]
async fn unknown_status_filter_is_rejected() {
    let config = TestConfig::default();
    let patient = TestUser::patient("patient@example.com");

    let (status, _) = send(
        &config,
        "GET",
        "/?status=confirmed",
        Some(&token_for(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (status, _) = send(
        &config,
        "GET",
        &format!("/{}", Uuid::new_v4()),
        Some(&token_for(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_declared_doctor_role_is_forbidden() {
    let config = TestConfig::default();
    let mallory = TestUser::doctor("mallory@example.com");
    let token = JwtTestUtils::create_self_declared_token(&mallory, &config.jwt_secret);

    let (status, _) = send(&config, "GET", "/", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn appointment_detail_includes_names() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &id.to_string(),
                &patient.id,
                &doctor.id,
                "2030-01-07T10:00:00Z",
                "2030-01-07T10:30:00Z",
                "scheduled",
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor.id, "Asha", "Mehta", "general")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_profile_response(&patient.id, "Priya", "Sharma")
        ])))
        .mount(&mock_server)
        .await;

    let (status, body) = send(
        &config,
        "GET",
        &format!("/{}", id),
        Some(&token_for(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["patient_name"], "Priya Sharma");
    assert_eq!(body["doctor_name"], "Dr. Asha Mehta");
    assert_eq!(body["doctor_specialization"], "General Physician");
}
