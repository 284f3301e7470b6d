//! Settings commands.

use crate::app::AppState;
use crate::config::ClientConfig;
use crate::error::AppError;

/// Get the current client settings.
pub async fn get_settings(state: &AppState) -> Result<ClientConfig, AppError> {
    Ok(state.config().await)
}

/// Validate, persist and apply new settings.
pub async fn update_settings(state: &AppState, config: ClientConfig) -> Result<(), AppError> {
    state.update_config(config).await
}
