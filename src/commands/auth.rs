//! Primary authentication commands.

use crate::app::AppState;
use crate::error::AppError;
use crate::models::User;

/// Sign in with a platform session token and mount notifications.
pub async fn sign_in(state: &AppState, token: String) -> Result<User, AppError> {
    let user = state.auth.sign_in(&token).await?;
    state.mount_notifications().await?;
    Ok(user)
}

/// Sign out: unmount notifications and end the session.
pub async fn sign_out(state: &AppState) -> Result<(), AppError> {
    state.unmount_notifications().await;
    state.auth.sign_out().await
}

/// The signed-in user, if any.
pub async fn get_current_user(state: &AppState) -> Result<Option<User>, AppError> {
    Ok(state.auth.current_user())
}
