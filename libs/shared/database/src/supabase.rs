use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin client over the Supabase REST (PostgREST) and Auth (GoTrue) APIs.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    /// Service-role headers. They bypass row level security, so only server
    /// initiated writes go through them.
    fn admin_headers(&self) -> Result<HeaderMap> {
        if self.service_role_key.is_empty() {
            return Err(anyhow!("Service role key not configured"));
        }

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.service_role_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_role_key))?,
        );

        Ok(headers)
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let response = self.send(method, path, headers, body).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Same as `request_with_headers`, authenticated with the service role.
    pub async fn admin_request<T>(&self, method: Method, path: &str,
                                  body: Option<Value>, extra_headers: Option<HeaderMap>)
                                  -> Result<T>
    where T: DeserializeOwned {
        let mut headers = self.admin_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let response = self.send(method, path, headers, body).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    async fn send(&self, method: Method, path: &str, headers: HeaderMap,
                  body: Option<Value>) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        Ok(response)
    }

    /// Create an auth user. `metadata` lands in the user's `user_metadata`.
    pub async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<Value> {
        debug!("Registering auth user {}", email);

        self.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": password,
                "data": metadata
            })),
        ).await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Value> {
        debug!("Password sign-in for {}", email);

        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({
                "email": email,
                "password": password
            })),
        ).await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Value> {
        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=refresh_token",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        ).await
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> Result<Value> {
        self.request::<Value>(
            Method::GET,
            "/auth/v1/user",
            Some(auth_token),
            None,
        ).await
    }

    /// Write `app_metadata` on an auth user. Only the service role can set it,
    /// which makes it the trusted home for the user's role.
    pub async fn set_app_metadata(&self, user_id: &str, app_metadata: Value) -> Result<Value> {
        debug!("Updating app_metadata for auth user {}", user_id);

        self.admin_request(
            Method::PUT,
            &format!("/auth/v1/admin/users/{}", user_id),
            Some(json!({ "app_metadata": app_metadata })),
            None,
        ).await
    }

    pub async fn delete_auth_user(&self, user_id: &str) -> Result<()> {
        debug!("Deleting auth user {}", user_id);

        let headers = self.admin_headers()?;
        self.send(
            Method::DELETE,
            &format!("/auth/v1/admin/users/{}", user_id),
            headers,
            None,
        ).await?;

        Ok(())
    }

    /// Fetch the first row of `table` whose `id` matches, if any.
    pub async fn find_by_id(&self, table: &str, id: &str, auth_token: &str) -> Result<Option<Value>> {
        let path = format!("/rest/v1/{}?id=eq.{}", table, id);

        let mut rows: Vec<Value> = self.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(rows.swap_remove(0)))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: url.to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-key".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            twilio_base_url: String::new(),
            port: 3000,
        }
    }

    #[tokio::test]
    async fn test_request_sends_api_key_and_bearer() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctor_profiles"))
            .and(query_param("id", "eq.abc"))
            .and(header("apikey", "test-anon-key"))
            .and(header("Authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "abc" }])))
            .mount(&mock_server)
            .await;

        let client = SupabaseClient::new(&config(&mock_server.uri()));
        let row = client.find_by_id("doctor_profiles", "abc", "token-1").await.unwrap();

        assert_eq!(row.unwrap()["id"], "abc");
    }

    #[tokio::test]
    async fn test_find_by_id_returns_none_for_empty_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client = SupabaseClient::new(&config(&mock_server.uri()));
        let row = client.find_by_id("appointments", "missing", "token").await.unwrap();

        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_classified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
            .mount(&mock_server)
            .await;

        let client = SupabaseClient::new(&config(&mock_server.uri()));
        let err = client.get_user_profile("stale").await.unwrap_err();

        assert!(err.to_string().starts_with("Authentication error"));
    }

    #[tokio::test]
    async fn test_admin_calls_use_service_role() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/admin/users/abc"))
            .and(header("apikey", "test-service-key"))
            .and(header("Authorization", "Bearer test-service-key"))
            .and(body_json(json!({ "app_metadata": { "user_type": "doctor" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc" })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/auth/v1/admin/users/abc"))
            .and(header("Authorization", "Bearer test-service-key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SupabaseClient::new(&config(&mock_server.uri()));
        client.set_app_metadata("abc", json!({ "user_type": "doctor" })).await.unwrap();
        client.delete_auth_user("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_request_without_service_key_fails_locally() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let mut config = config(&mock_server.uri());
        config.supabase_service_role_key = String::new();
        let client = SupabaseClient::new(&config);

        let err = client.set_app_metadata("abc", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Service role key not configured"));
    }
}
