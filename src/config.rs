//! Client configuration.
//!
//! Settings are persisted as JSON in the app data directory. A missing or
//! unreadable file falls back to defaults rather than failing startup.

use crate::error::AppError;
use crate::services::api_client::ApiClientConfig;
use crate::services::notification_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename inside the app data directory.
const SETTINGS_FILE: &str = "settings.json";

/// Default API base URL for a local development server.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the platform API.
    pub api_base_url: String,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Notification polling configuration.
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn api_client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            base_url: self.api_base_url.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::invalid_input_field(
                "API base URL is required",
                "api_base_url",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::invalid_input_field(
                "Request timeout must be positive",
                "request_timeout_secs",
            ));
        }
        self.sync.validate()
    }
}

/// Path of the settings file inside the app data directory.
pub fn settings_path(app_data_dir: &Path) -> PathBuf {
    app_data_dir.join(SETTINGS_FILE)
}

/// Load settings, using defaults if the file is missing or corrupt.
pub async fn load_settings(path: &Path) -> ClientConfig {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ClientConfig::default(),
        Err(e) => {
            log::warn!("[config] Failed to read {}: {}", path.display(), e);
            return ClientConfig::default();
        }
    };

    match serde_json::from_str::<ClientConfig>(&raw) {
        Ok(mut config) => {
            config.sync = config.sync.clamped();
            config
        }
        Err(e) => {
            log::warn!("[config] Ignoring corrupt settings file: {}", e);
            ClientConfig::default()
        }
    }
}

/// Save settings to disk.
pub async fn save_settings(path: &Path, config: &ClientConfig) -> Result<(), AppError> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::internal(format!("Failed to create settings directory: {}", e))
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| AppError::internal(format!("Failed to save settings: {}", e)))
}
