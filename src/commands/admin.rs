//! Admin gate commands.

use crate::app::AppState;
use crate::error::AppError;
use crate::services::admin_gate::GateState;
use crate::services::api_client::AdminCredentials;
use serde::Deserialize;

/// Input for submit_admin_login.
#[derive(Debug, Deserialize)]
pub struct AdminLoginInput {
    pub email: String,
    pub password: String,
}

/// Current gate state. Evaluation itself is driven by auth changes.
pub async fn get_admin_gate_state(state: &AppState) -> Result<GateState, AppError> {
    Ok(state.gate.state().await)
}

/// Submit the secondary admin credential.
pub async fn submit_admin_login(
    state: &AppState,
    input: AdminLoginInput,
) -> Result<GateState, AppError> {
    let email = input.email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::invalid_input_field("Email is required", "email"));
    }

    state
        .gate
        .submit_secondary_login(AdminCredentials {
            email,
            password: input.password,
        })
        .await
}

/// End the secondary admin session.
pub async fn admin_logout(state: &AppState) -> Result<GateState, AppError> {
    Ok(state.gate.logout().await)
}
