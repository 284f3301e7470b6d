//! Notification commands.
//!
//! Reads come from the mounted synchronizer's local state; actions are
//! optimistic and never fail because of the network.

use crate::app::AppState;
use crate::error::AppError;
use crate::models::{Notification, NotificationPresentation};
use crate::services::notification_sync::Visibility;
use serde::Serialize;

/// A notification together with how to present it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    #[serde(flatten)]
    pub notification: Notification,
    pub presentation: NotificationPresentation,
}

/// Response for get_notifications.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsView {
    pub notifications: Vec<NotificationItem>,
    pub unread_count: usize,
    pub server_unread_count: Option<u64>,
    pub server_total: Option<u64>,
    pub popup_visible: bool,
    pub last_fetch_time: Option<i64>,
    pub last_error: Option<String>,
}

/// Get the local notification list in display order.
pub async fn get_notifications(state: &AppState) -> Result<NotificationsView, AppError> {
    let mounted = state.mounted_notifications().await?;
    let snapshot = mounted.sync.snapshot().await;
    let status = mounted.sync.status().await;

    Ok(NotificationsView {
        notifications: snapshot
            .notifications
            .into_iter()
            .map(|notification| NotificationItem {
                presentation: notification.presentation(),
                notification,
            })
            .collect(),
        unread_count: snapshot.unread_count,
        server_unread_count: snapshot.server_unread_count,
        server_total: snapshot.server_total,
        popup_visible: snapshot.popup_visible,
        last_fetch_time: status.last_fetch_time,
        last_error: status.last_error,
    })
}

/// Ask the poll loop to fetch now.
pub async fn refresh_notifications(state: &AppState) -> Result<(), AppError> {
    state.mounted_notifications().await?.handle.refresh().await
}

pub async fn mark_notification_read(state: &AppState, id: String) -> Result<(), AppError> {
    if id.is_empty() {
        return Err(AppError::invalid_input_field("Notification id is required", "id"));
    }
    state.mounted_notifications().await?.sync.mark_as_read(&id).await;
    Ok(())
}

pub async fn mark_all_notifications_read(state: &AppState) -> Result<(), AppError> {
    state.mounted_notifications().await?.sync.mark_all_as_read().await;
    Ok(())
}

pub async fn delete_notification(state: &AppState, id: String) -> Result<(), AppError> {
    if id.is_empty() {
        return Err(AppError::invalid_input_field("Notification id is required", "id"));
    }
    state.mounted_notifications().await?.sync.delete(&id).await;
    Ok(())
}

pub async fn delete_all_notifications(state: &AppState) -> Result<(), AppError> {
    state.mounted_notifications().await?.sync.delete_all().await;
    Ok(())
}

pub async fn dismiss_first_time_popup(state: &AppState) -> Result<(), AppError> {
    state
        .mounted_notifications()
        .await?
        .sync
        .dismiss_first_time_popup()
        .await;
    Ok(())
}

/// Forget that the signed-in user saw the first-time popup, so the next
/// mount may show it again.
pub async fn reset_first_time_popup(state: &AppState) -> Result<(), AppError> {
    let mounted = state.mounted_notifications().await?;
    state.markers.reset_first_popup(mounted.sync.user_id()).await
}

/// The window gained focus.
pub async fn window_focused(state: &AppState) -> Result<(), AppError> {
    state.mounted_notifications().await?.handle.window_focused().await
}

/// The document's visibility changed.
pub async fn visibility_changed(state: &AppState, visibility: Visibility) -> Result<(), AppError> {
    state
        .mounted_notifications()
        .await?
        .handle
        .visibility_changed(visibility)
        .await
}
