use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{InAppNotification, NewInAppNotification, NotificationError, NotificationListQuery};

/// In-app notifications kept in the `notifications` table.
///
/// Reads and read-marking run with the recipient's token. Creation uses the
/// service role, since the writer is usually the other appointment participant.
pub struct InAppNotificationService {
    supabase: SupabaseClient,
}

impl InAppNotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create(&self, notification: &NewInAppNotification) -> Result<InAppNotification, NotificationError> {
        debug!("Creating {:?} notification for {}", notification.kind, notification.user_id);

        let mut rows: Vec<Value> = self.supabase.admin_request(
            Method::POST,
            "/rest/v1/notifications",
            Some(json!(notification)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(NotificationError::Database("Failed to create notification".to_string()));
        }

        let created: InAppNotification = serde_json::from_value(rows.swap_remove(0))?;
        info!("Notification {} created for {}", created.id, created.user_id);

        Ok(created)
    }

    /// Newest first.
    pub async fn list(
        &self,
        user_id: &str,
        query: &NotificationListQuery,
        auth_token: &str,
    ) -> Result<Vec<InAppNotification>, NotificationError> {
        let mut path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit={}",
            user_id,
            query.limit()
        );
        if !query.include_read() {
            path.push_str("&is_read=eq.false");
        }

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(NotificationError::from))
            .collect()
    }

    /// Mark one of the user's notifications read. Someone else's id is
    /// reported as missing.
    pub async fn mark_read(
        &self,
        user_id: &str,
        notification_id: Uuid,
        auth_token: &str,
    ) -> Result<InAppNotification, NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}&user_id=eq.{}", notification_id, user_id);

        let mut rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if rows.is_empty() {
            return Err(NotificationError::NotFound);
        }

        Ok(serde_json::from_value(rows.swap_remove(0))?)
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, user_id: &str, auth_token: &str) -> Result<usize, NotificationError> {
        let path = format!("/rest/v1/notifications?user_id=eq.{}&is_read=eq.false", user_id);

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(json!({ "is_read": true })),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        debug!("Marked {} notifications read for {}", rows.len(), user_id);
        Ok(rows.len())
    }
}
