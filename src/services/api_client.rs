//! Platform API client.
//!
//! Provides the HTTP client for the placement platform's REST API. Every
//! endpoint answers with a `{success, data, message}` envelope, and the
//! session travels in a `token` cookie held by the client's cookie jar.

use crate::error::AppError;
use crate::models::{ApiEnvelope, Notification, User};
use reqwest::cookie::Jar;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Name of the session cookie issued by the platform.
pub const SESSION_COOKIE: &str = "token";

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the platform API (e.g., `https://placements.example.edu`).
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Only return unread notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
}

/// Pagination block of a notifications page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u32,
}

/// `data` of `GET /api/notifications`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    /// Rows that fail to decode are skipped so one bad row cannot block
    /// the rest of the page.
    #[serde(default, deserialize_with = "skip_bad_rows")]
    pub notifications: Vec<Notification>,

    /// Server-side unread total across all pages, when reported.
    #[serde(default)]
    pub unread_count: Option<u64>,

    #[serde(default)]
    pub pagination: Option<Pagination>,
}

fn skip_bad_rows<'de, D>(deserializer: D) -> Result<Vec<Notification>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();

    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<Notification>(row) {
            Ok(notification) => Some(notification),
            Err(e) => {
                log::warn!("[api] Skipping malformed notification row: {}", e);
                None
            }
        })
        .collect())
}

/// `data` of `GET /api/admin/verify-session`.
#[derive(Debug, Clone, Deserialize)]
struct AdminSessionStatus {
    #[serde(default)]
    verified: bool,
}

/// Secondary admin credentials.
#[derive(Debug, Clone, Serialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

/// Platform API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ApiClientConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            AppError::invalid_input_field(format!("Invalid API URL: {}", e), "api_base_url")
        })?;

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            jar,
            base_url,
        })
    }

    /// Install the primary session token as the session cookie.
    pub fn set_session_token(&self, token: &str) {
        let cookie = format!("{}={}; Path=/", SESSION_COOKIE, token);
        self.jar.add_cookie_str(&cookie, &self.base_url);
    }

    /// Expire the session cookie locally.
    pub fn clear_session_token(&self) {
        let cookie = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
        self.jar.add_cookie_str(&cookie, &self.base_url);
    }

    /// Build the full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Map a response to its envelope, classifying HTTP failures.
    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> Result<ApiEnvelope<T>, AppError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<ApiEnvelope<T>>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        match status {
            StatusCode::UNAUTHORIZED => Err(AppError::authentication_expired(message)),
            StatusCode::FORBIDDEN => Err(AppError::forbidden(message)),
            StatusCode::NOT_FOUND => Err(AppError::not_found(endpoint)),
            _ => Err(AppError::api_full(message, status.as_u16(), endpoint)),
        }
    }

    /// Send a request without a body and decode the envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<ApiEnvelope<T>, AppError> {
        let response = self.client.request(method, self.api_url(endpoint)).send().await?;
        Self::handle_response(response, endpoint).await
    }

    /// Fetch one page of the current user's notifications.
    pub async fn list_notifications(
        &self,
        query: &NotificationsQuery,
    ) -> Result<NotificationPage, AppError> {
        let endpoint = "/api/notifications";
        let response = self
            .client
            .get(self.api_url(endpoint))
            .query(query)
            .send()
            .await?;

        Self::handle_response::<NotificationPage>(response, endpoint)
            .await?
            .into_data(endpoint)
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        let endpoint = format!("/api/notifications/{}/read", urlencoding::encode(id));
        self.send::<serde_json::Value>(Method::PATCH, &endpoint)
            .await?
            .into_unit(&endpoint)
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), AppError> {
        let endpoint = "/api/notifications/read-all";
        self.send::<serde_json::Value>(Method::PATCH, endpoint)
            .await?
            .into_unit(endpoint)
    }

    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let endpoint = format!("/api/notifications/{}", urlencoding::encode(id));
        self.send::<serde_json::Value>(Method::DELETE, &endpoint)
            .await?
            .into_unit(&endpoint)
    }

    pub async fn delete_all_notifications(&self) -> Result<(), AppError> {
        let endpoint = "/api/notifications";
        self.send::<serde_json::Value>(Method::DELETE, endpoint)
            .await?
            .into_unit(endpoint)
    }

    /// Resolve the primary identity behind the current session cookie.
    pub async fn current_user(&self) -> Result<User, AppError> {
        let endpoint = "/api/auth/me";
        self.send::<User>(Method::GET, endpoint)
            .await?
            .into_data(endpoint)
    }

    /// Ask the server whether the secondary admin session is still valid.
    ///
    /// Only an explicit `success: true` with `verified: true` counts as
    /// verified; a missing `data` block is treated as not verified.
    pub async fn verify_admin_session(&self) -> Result<bool, AppError> {
        let endpoint = "/api/admin/verify-session";
        let envelope = self.send::<AdminSessionStatus>(Method::GET, endpoint).await?;
        Ok(envelope.success && envelope.data.is_some_and(|d| d.verified))
    }

    /// Submit secondary admin credentials. Returns whether the server accepted them.
    pub async fn admin_login(&self, credentials: &AdminCredentials) -> Result<bool, AppError> {
        let endpoint = "/api/admin/login";
        let response = self
            .client
            .post(self.api_url(endpoint))
            .json(credentials)
            .send()
            .await?;

        match Self::handle_response::<serde_json::Value>(response, endpoint).await {
            Ok(envelope) => Ok(envelope.success),
            Err(AppError::AuthenticationExpired { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn admin_logout(&self) -> Result<(), AppError> {
        let endpoint = "/api/admin/logout";
        self.send::<serde_json::Value>(Method::POST, endpoint)
            .await?
            .into_unit(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(ApiClientConfig {
            base_url: base.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_construction() {
        let c = client("https://placements.example.edu/");
        assert_eq!(
            c.api_url("/api/notifications"),
            "https://placements.example.edu/api/notifications"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = ApiClient::new(ApiClientConfig {
            base_url: "not a url".to_string(),
            timeout_secs: 5,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn test_notifications_query_serialization() {
        let query = NotificationsQuery {
            page: Some(1),
            limit: Some(50),
            unread_only: Some(true),
        };

        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("\"limit\":50"));
        assert!(json.contains("\"unreadOnly\":true"));

        let empty = serde_json::to_string(&NotificationsQuery::default()).unwrap();
        assert_eq!(empty, "{}");
    }

    #[test]
    fn test_malformed_rows_do_not_drop_the_page() {
        let json = r#"{
            "notifications": [
                {"_id": "ok", "priority": "high", "createdAt": "2024-03-01T10:00:00Z"},
                {"_id": "nullprio", "priority": null, "createdAt": "2024-03-01T11:00:00Z"},
                {"_id": "odd", "priority": "normal", "createdAt": "2024-03-01T12:00:00Z"},
                {"_id": "nodate", "priority": "low"},
                "not an object"
            ],
            "unreadCount": 3
        }"#;

        let page: NotificationPage = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = page.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "nullprio", "odd"]);
        assert_eq!(page.notifications[1].priority, Priority::Medium);
        assert_eq!(page.notifications[2].priority, Priority::Medium);
        assert_eq!(page.unread_count, Some(3));
    }

    #[test]
    fn test_null_notification_list() {
        let page: NotificationPage = serde_json::from_str(r#"{"notifications": null}"#).unwrap();
        assert!(page.notifications.is_empty());
    }

    #[test]
    fn test_notification_page_defaults() {
        let page: NotificationPage = serde_json::from_str(r#"{"notifications": []}"#).unwrap();
        assert!(page.notifications.is_empty());
        assert!(page.unread_count.is_none());
        assert!(page.pagination.is_none());
    }
}
