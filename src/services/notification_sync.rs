//! Notification synchronizer.
//!
//! Keeps a local copy of the signed-in user's latest notifications page:
//! - Fetch on mount, on a fixed interval, on window focus, and when the
//!   document becomes visible
//! - Full-page replace on every successful fetch (last response wins)
//! - Optimistic mark-as-read / delete with fire-and-log server updates
//! - The one-time "you have new notifications" popup decision
//!
//! Fetch failures never escape: they are logged, prior state is kept, and
//! the next tick tries again.

use crate::error::AppError;
use crate::models::notification::{sort_for_display, unread_count};
use crate::models::{Notification, User};
use crate::services::api_client::{ApiClient, NotificationsQuery};
use crate::services::events::{ClientEvent, EventBus, UpdateSource};
use crate::services::storage::MarkerStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default number of notifications requested per fetch.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page the client will ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Notification polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Page size for each fetch.
    pub page_size: u32,

    /// Only fetch unread notifications.
    pub unread_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            unread_only: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_secs == 0 {
            return Err(AppError::invalid_input_field(
                "Poll interval must be at least one second",
                "poll_interval_secs",
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::invalid_input_field(
                format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
                "page_size",
            ));
        }
        Ok(())
    }

    /// Bring out-of-range values back into range.
    pub fn clamped(mut self) -> Self {
        self.poll_interval_secs = self.poll_interval_secs.max(1);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Document visibility as reported by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Local view of the user's notifications.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationState {
    /// Latest page, in display order.
    pub notifications: Vec<Notification>,

    /// Unread items in `notifications`.
    pub unread_count: usize,

    /// Unread total across all pages as last reported by the server.
    pub server_unread_count: Option<u64>,

    /// Total across all pages, from the server's pagination block.
    pub server_total: Option<u64>,

    /// Whether the first-time popup is showing.
    pub popup_visible: bool,

    /// True until the first successful fetch after mount.
    pub is_initial_load: bool,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
            unread_count: 0,
            server_unread_count: None,
            server_total: None,
            popup_visible: false,
            is_initial_load: true,
        }
    }
}

/// Fetch bookkeeping, kept apart from the notification state so a failed
/// fetch leaves that state untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Last successful fetch timestamp (Unix seconds).
    pub last_fetch_time: Option<i64>,

    /// Last fetch error message, cleared by the next success.
    pub last_error: Option<String>,

    /// Number of fetches that failed since the last success.
    pub consecutive_failures: u32,
}

/// Commands that can be sent to the poll loop.
#[derive(Debug)]
pub enum SyncCommand {
    /// Fetch now.
    Refresh,

    /// The window gained focus.
    WindowFocused,

    /// The document's visibility changed.
    VisibilityChanged(Visibility),

    /// Replace the configuration and restart the interval.
    UpdateConfig(SyncConfig),

    /// Stop polling.
    Stop,
}

/// Lightweight handle for driving a mounted synchronizer.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    config: Arc<RwLock<SyncConfig>>,
    mounted: CancellationToken,
}

impl SyncHandle {
    async fn send(&self, command: SyncCommand) -> Result<(), AppError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AppError::internal("Notification sync not running"))
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        self.send(SyncCommand::Refresh).await
    }

    pub async fn window_focused(&self) -> Result<(), AppError> {
        self.send(SyncCommand::WindowFocused).await
    }

    pub async fn visibility_changed(&self, visibility: Visibility) -> Result<(), AppError> {
        self.send(SyncCommand::VisibilityChanged(visibility)).await
    }

    pub async fn update_config(&self, config: SyncConfig) -> Result<(), AppError> {
        config.validate()?;
        self.send(SyncCommand::UpdateConfig(config)).await
    }

    pub async fn get_config(&self) -> SyncConfig {
        self.config.read().await.clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    /// Unmount: stop polling and discard any response still in flight.
    pub fn unmount(&self) {
        self.mounted.cancel();
        let _ = self.command_tx.try_send(SyncCommand::Stop);
    }
}

/// Notification synchronizer for one signed-in user.
pub struct NotificationSync {
    client: ApiClient,
    markers: MarkerStore,
    events: EventBus,
    user_id: String,
    config: Arc<RwLock<SyncConfig>>,
    state: Arc<RwLock<NotificationState>>,
    status: Arc<RwLock<SyncStatus>>,
    /// Cancelled on unmount; every state write checks it first.
    mounted: CancellationToken,
}

impl NotificationSync {
    pub fn new(
        client: ApiClient,
        markers: MarkerStore,
        events: EventBus,
        user: &User,
        config: SyncConfig,
    ) -> Self {
        Self {
            client,
            markers,
            events,
            user_id: user.id.clone(),
            config: Arc::new(RwLock::new(config.clamped())),
            state: Arc::new(RwLock::new(NotificationState::default())),
            status: Arc::new(RwLock::new(SyncStatus::default())),
            mounted: CancellationToken::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn snapshot(&self) -> NotificationState {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    pub fn unmount(&self) {
        self.mounted.cancel();
    }

    /// Fetch the latest page and replace local state.
    ///
    /// Returns whether a response was applied. Errors are logged and
    /// recorded in the status, never returned.
    pub async fn fetch(&self) -> bool {
        if !self.is_mounted() {
            return false;
        }

        match self.try_fetch().await {
            Ok(applied) => applied,
            Err(e) => {
                log::warn!("[notifications] Fetch failed for user {}: {}", self.user_id, e);
                if e.is_authentication_expired() {
                    self.events.emit(ClientEvent::AuthExpired {
                        message: e.to_string(),
                    });
                }
                let mut status = self.status.write().await;
                status.last_error = Some(e.to_string());
                status.consecutive_failures += 1;
                false
            }
        }
    }

    async fn try_fetch(&self) -> Result<bool, AppError> {
        let query = {
            let config = self.config.read().await;
            NotificationsQuery {
                page: Some(1),
                limit: Some(config.page_size),
                unread_only: config.unread_only.then_some(true),
            }
        };

        let page = self.client.list_notifications(&query).await?;

        if !self.is_mounted() {
            log::debug!("[notifications] Discarding response received after unmount");
            return Ok(false);
        }

        let mut notifications = page.notifications;
        if let Some(limit) = query.limit {
            notifications.truncate(limit as usize);
        }
        for notification in &mut notifications {
            notification.normalize();
        }
        sort_for_display(&mut notifications);

        let unread = unread_count(&notifications);
        let total = notifications.len();

        let first_load = {
            let mut state = self.state.write().await;
            state.notifications = notifications;
            state.unread_count = unread;
            state.server_unread_count = page.unread_count;
            state.server_total = page.pagination.map(|p| p.total);
            std::mem::replace(&mut state.is_initial_load, false)
        };

        {
            let mut status = self.status.write().await;
            status.last_fetch_time = Some(Utc::now().timestamp());
            status.last_error = None;
            status.consecutive_failures = 0;
        }

        self.events.emit(ClientEvent::NotificationsUpdated {
            source: UpdateSource::Fetch,
            unread_count: unread,
            total,
        });

        if first_load && unread > 0 {
            self.maybe_show_first_time_popup(unread).await;
        }

        Ok(true)
    }

    /// Show the popup unless this user has already seen it.
    async fn maybe_show_first_time_popup(&self, unread: usize) {
        let seen = match self.markers.first_popup_seen(&self.user_id).await {
            Ok(seen) => seen,
            Err(e) => {
                // An unreadable marker must not nag the user.
                log::warn!("[notifications] Failed to read popup marker: {}", e);
                true
            }
        };

        if seen || !self.is_mounted() {
            return;
        }

        self.state.write().await.popup_visible = true;
        self.markers.mark_popup_shown_this_session(&self.user_id).await;

        log::info!(
            "[notifications] Showing first-time popup ({} unread) for user {}",
            unread,
            self.user_id
        );
        self.events.emit(ClientEvent::FirstTimePopup {
            visible: true,
            unread_count: unread,
        });
    }

    /// Hide the popup and remember the dismissal in both stores.
    pub async fn dismiss_first_time_popup(&self) {
        let unread = {
            let mut state = self.state.write().await;
            state.popup_visible = false;
            state.unread_count
        };

        if let Err(e) = self.markers.mark_first_popup_seen(&self.user_id).await {
            log::error!("[notifications] Failed to persist popup dismissal: {}", e);
        }

        self.events.emit(ClientEvent::FirstTimePopup {
            visible: false,
            unread_count: unread,
        });
    }

    /// Optimistically mark one notification read, then tell the server.
    pub async fn mark_as_read(&self, id: &str) {
        let now = Utc::now();
        let (unread, total) = {
            let mut state = self.state.write().await;
            match state.notifications.iter_mut().find(|n| n.id == id) {
                Some(notification) => notification.mark_read(now),
                None => log::debug!("[notifications] mark_as_read for unloaded id {}", id),
            }
            state.unread_count = unread_count(&state.notifications);
            (state.unread_count, state.notifications.len())
        };
        self.emit_local_update(UpdateSource::MarkedRead, unread, total);

        if let Err(e) = self.client.mark_notification_read(id).await {
            log::error!("[notifications] Failed to mark {} as read: {}", id, e);
        }
    }

    /// Optimistically mark every loaded notification read, then tell the server.
    pub async fn mark_all_as_read(&self) {
        let now = Utc::now();
        let total = {
            let mut state = self.state.write().await;
            for notification in state.notifications.iter_mut() {
                notification.mark_read(now);
            }
            state.unread_count = 0;
            state.notifications.len()
        };
        self.emit_local_update(UpdateSource::MarkedRead, 0, total);

        if let Err(e) = self.client.mark_all_notifications_read().await {
            log::error!("[notifications] Failed to mark all as read: {}", e);
        }
    }

    /// Optimistically remove one notification, then tell the server.
    pub async fn delete(&self, id: &str) {
        let (unread, total) = {
            let mut state = self.state.write().await;
            state.notifications.retain(|n| n.id != id);
            state.unread_count = unread_count(&state.notifications);
            (state.unread_count, state.notifications.len())
        };
        self.emit_local_update(UpdateSource::Deleted, unread, total);

        if let Err(e) = self.client.delete_notification(id).await {
            log::error!("[notifications] Failed to delete {}: {}", id, e);
        }
    }

    /// Optimistically clear the list, then tell the server.
    pub async fn delete_all(&self) {
        {
            let mut state = self.state.write().await;
            state.notifications.clear();
            state.unread_count = 0;
        }
        self.emit_local_update(UpdateSource::Deleted, 0, 0);

        if let Err(e) = self.client.delete_all_notifications().await {
            log::error!("[notifications] Failed to delete all notifications: {}", e);
        }
    }

    fn emit_local_update(&self, source: UpdateSource, unread_count: usize, total: usize) {
        self.events.emit(ClientEvent::NotificationsUpdated {
            source,
            unread_count,
            total,
        });
    }

    /// Run a fetch on its own task so overlapping triggers are not coalesced.
    fn spawn_fetch(self: &Arc<Self>) {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            sync.fetch().await;
        });
    }

    /// Mount: start the background poll loop.
    ///
    /// Fetches immediately, then on every interval tick and every focus /
    /// visible trigger. The loop ends on `Stop`, on unmount, or when every
    /// handle has been dropped.
    pub fn start(self: Arc<Self>) -> SyncHandle {
        let (tx, mut rx) = mpsc::channel::<SyncCommand>(16);
        let handle = SyncHandle {
            command_tx: tx,
            config: self.config.clone(),
            mounted: self.mounted.clone(),
        };

        tokio::spawn(async move {
            let sync = self;
            log::info!("[notifications] Mounted for user {}", sync.user_id);
            sync.spawn_fetch();

            let period = sync.config.read().await.poll_interval();
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Consume the first (immediate) tick since we just fetched
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = sync.mounted.cancelled() => break,
                    _ = interval.tick() => {
                        log::debug!("[notifications] Periodic fetch");
                        sync.spawn_fetch();
                    }
                    command = rx.recv() => match command {
                        Some(SyncCommand::Refresh) => sync.spawn_fetch(),
                        Some(SyncCommand::WindowFocused) => {
                            log::debug!("[notifications] Window focused");
                            sync.spawn_fetch();
                        }
                        Some(SyncCommand::VisibilityChanged(Visibility::Visible)) => {
                            log::debug!("[notifications] Document visible");
                            sync.spawn_fetch();
                        }
                        Some(SyncCommand::VisibilityChanged(Visibility::Hidden)) => {}
                        Some(SyncCommand::UpdateConfig(config)) => {
                            let config = config.clamped();
                            log::info!(
                                "[notifications] Config updated, interval={}s",
                                config.poll_interval_secs
                            );
                            interval = time::interval(config.poll_interval());
                            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                            interval.tick().await;
                            *sync.config.write().await = config;
                        }
                        Some(SyncCommand::Stop) | None => break,
                    }
                }
            }

            sync.mounted.cancel();
            log::info!("[notifications] Unmounted for user {}", sync.user_id);
        });

        handle
    }
}
