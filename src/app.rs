//! Application state shared by all commands.
//!
//! Wires storage, the API client, primary auth, the admin gate and the
//! notification synchronizer together, and owns their background tasks.
//! Both the gate and the notification mount follow the primary auth
//! snapshot, so sign-in, sign-out, session expiry and user switches reach
//! them without any command having to ask.

use crate::config::{self, ClientConfig};
use crate::db::{self, pool::DbPool};
use crate::error::AppError;
use crate::models::{AuthSnapshot, User};
use crate::services::admin_gate::AdminGate;
use crate::services::api_client::ApiClient;
use crate::services::events::EventBus;
use crate::services::notification_sync::{NotificationSync, SyncHandle};
use crate::services::primary_auth::PrimaryAuth;
use crate::services::storage::{MarkerStore, SessionStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// A synchronizer mounted for one user.
#[derive(Clone)]
pub struct MountedNotifications {
    pub sync: Arc<NotificationSync>,
    pub handle: SyncHandle,
}

/// Owns the notification synchronizer for whoever is signed in.
pub struct NotificationMount {
    client: ApiClient,
    markers: MarkerStore,
    events: EventBus,
    config: Arc<RwLock<ClientConfig>>,
    slot: RwLock<Option<MountedNotifications>>,
}

impl NotificationMount {
    fn new(
        client: ApiClient,
        markers: MarkerStore,
        events: EventBus,
        config: Arc<RwLock<ClientConfig>>,
    ) -> Self {
        Self {
            client,
            markers,
            events,
            config,
            slot: RwLock::new(None),
        }
    }

    /// Mount for `user`. Mounting the user already mounted is a no-op; a
    /// different user replaces the previous mount.
    pub async fn mount(&self, user: &User) -> MountedNotifications {
        let mut slot = self.slot.write().await;
        if let Some(mounted) = slot.as_ref() {
            if mounted.sync.user_id() == user.id && mounted.handle.is_mounted() {
                return mounted.clone();
            }
            log::info!(
                "[app] Replacing notification mount for {} with {}",
                mounted.sync.user_id(),
                user.id
            );
            mounted.handle.unmount();
        }

        let sync_config = self.config.read().await.sync.clone();
        let sync = Arc::new(NotificationSync::new(
            self.client.clone(),
            self.markers.clone(),
            self.events.clone(),
            user,
            sync_config,
        ));
        let handle = sync.clone().start();
        let mounted = MountedNotifications { sync, handle };
        *slot = Some(mounted.clone());

        mounted
    }

    pub async fn unmount(&self) {
        if let Some(mounted) = self.slot.write().await.take() {
            mounted.handle.unmount();
        }
    }

    pub async fn current(&self) -> Option<MountedNotifications> {
        self.slot.read().await.clone()
    }

    /// Follow the primary auth snapshot: mount for a resolved user, unmount
    /// when it resolves to nobody. A snapshot still loading leaves the
    /// current mount alone. The task ends when the sender is dropped.
    fn watch(self: Arc<Self>, mut auth: watch::Receiver<AuthSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let snapshot = auth.borrow_and_update().clone();
                if !snapshot.loading {
                    match snapshot.user {
                        Some(user) => {
                            self.mount(&user).await;
                        }
                        None => self.unmount().await,
                    }
                }
                if auth.changed().await.is_err() {
                    break;
                }
            }
            log::debug!("[app] Notification mount watcher stopped");
        })
    }

    fn unmount_now(&self) {
        if let Ok(mut slot) = self.slot.try_write() {
            if let Some(mounted) = slot.take() {
                mounted.handle.unmount();
            }
        }
    }
}

/// Everything the commands need.
pub struct AppState {
    pub pool: DbPool,
    pub client: ApiClient,
    pub markers: MarkerStore,
    pub events: EventBus,
    pub auth: PrimaryAuth,
    pub gate: Arc<AdminGate>,
    pub notifications: Arc<NotificationMount>,
    settings_path: PathBuf,
    config: Arc<RwLock<ClientConfig>>,
    watchers: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize from the app data directory, loading saved settings.
    pub async fn initialize(app_data_dir: &Path) -> Result<Self, AppError> {
        let settings_path = config::settings_path(app_data_dir);
        let config = config::load_settings(&settings_path).await;
        Self::with_config(app_data_dir, config).await
    }

    /// Initialize with explicit settings. Must be called inside a Tokio runtime.
    pub async fn with_config(app_data_dir: &Path, config: ClientConfig) -> Result<Self, AppError> {
        config.validate()?;

        let pool = db::initialize(&db::get_db_path(app_data_dir)).await?;
        let client = ApiClient::new(config.api_client_config())?;
        let markers = MarkerStore::new(pool.clone(), SessionStorage::new());
        let events = EventBus::new();
        let auth = PrimaryAuth::new(
            client.clone(),
            markers.clone(),
            events.clone(),
            &config.api_base_url,
        );

        log::info!("[app] Initialized against {}", config.api_base_url);

        let config = Arc::new(RwLock::new(config));
        let gate = Arc::new(AdminGate::new(client.clone(), markers.clone(), events.clone()));
        let notifications = Arc::new(NotificationMount::new(
            client.clone(),
            markers.clone(),
            events.clone(),
            config.clone(),
        ));
        let watchers = vec![
            gate.clone().watch(auth.subscribe()),
            notifications.clone().watch(auth.subscribe()),
        ];

        Ok(Self {
            pool,
            client,
            markers,
            events,
            auth,
            gate,
            notifications,
            settings_path: config::settings_path(app_data_dir),
            config,
            watchers,
        })
    }

    /// Restore a stored session, resolve the user and mount notifications.
    pub async fn start(&self) -> Result<(), AppError> {
        if let Err(e) = self.auth.restore_session() {
            log::warn!("[app] Could not restore stored session: {}", e);
        }
        if self.auth.resolve().await.is_some() {
            self.mount_notifications().await?;
        }
        Ok(())
    }

    pub async fn config(&self) -> ClientConfig {
        self.config.read().await.clone()
    }

    /// Persist new settings and apply the sync part to a mounted synchronizer.
    ///
    /// A changed API URL takes effect on the next start.
    pub async fn update_config(&self, new_config: ClientConfig) -> Result<(), AppError> {
        config::save_settings(&self.settings_path, &new_config).await?;

        if let Some(mounted) = self.notifications.current().await {
            mounted.handle.update_config(new_config.sync.clone()).await?;
        }

        *self.config.write().await = new_config;
        Ok(())
    }

    /// Mount the synchronizer for the signed-in user right away, without
    /// waiting for the auth watcher.
    pub async fn mount_notifications(&self) -> Result<MountedNotifications, AppError> {
        let user = self
            .auth
            .current_user()
            .ok_or_else(|| AppError::authentication("No signed-in user"))?;

        Ok(self.notifications.mount(&user).await)
    }

    pub async fn unmount_notifications(&self) {
        self.notifications.unmount().await;
    }

    /// The mounted synchronizer, or an error if nobody is signed in.
    pub async fn mounted_notifications(&self) -> Result<MountedNotifications, AppError> {
        self.notifications
            .current()
            .await
            .ok_or_else(|| AppError::authentication("Notifications are not mounted; sign in first"))
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
        self.notifications.unmount_now();
    }
}
