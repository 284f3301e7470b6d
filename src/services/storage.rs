//! Persistent and session-scoped per-user storage.
//!
//! Persistent values live in SQLite and survive restarts. Session values
//! live in memory and disappear when the session ends (`end_session`), the
//! way tab-scoped browser storage does. `MarkerStore` gives the rest of the
//! crate typed access to the handful of markers it needs.

use crate::db::persistent_storage;
use crate::db::pool::DbPool;
use crate::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const POPUP_SEEN_PREFIX: &str = "first_notification_popup_seen";
const POPUP_SHOWN_PREFIX: &str = "first_notification_popup_shown";
const ADMIN_SESSION_PREFIX: &str = "admin_session_active";

fn user_key(prefix: &str, user_id: &str) -> String {
    format!("{}:{}", prefix, user_id)
}

/// In-memory storage that lives exactly as long as one session.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn remove(&self, key: &str) {
        self.values.write().await.remove(key);
    }

    /// Drop everything, as closing the tab or browser would.
    pub async fn clear(&self) {
        self.values.write().await.clear();
    }
}

/// Typed access to the per-user markers.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    pool: DbPool,
    session: SessionStorage,
}

impl MarkerStore {
    pub fn new(pool: DbPool, session: SessionStorage) -> Self {
        Self { pool, session }
    }

    pub fn session(&self) -> &SessionStorage {
        &self.session
    }

    /// End the session: every session-scoped marker is gone afterwards.
    pub async fn end_session(&self) {
        self.session.clear().await;
    }

    /// Whether the first-time popup must stay hidden for this user.
    ///
    /// The session marker is checked first so a pending persistent write
    /// cannot let the popup reappear within the session.
    pub async fn first_popup_seen(&self, user_id: &str) -> Result<bool, AppError> {
        if self.session.get(&user_key(POPUP_SHOWN_PREFIX, user_id)).await.is_some() {
            return Ok(true);
        }

        let persisted =
            persistent_storage::get_value(&self.pool, &user_key(POPUP_SEEN_PREFIX, user_id)).await?;
        Ok(persisted.is_some())
    }

    /// Record that the popup was shown during this session.
    pub async fn mark_popup_shown_this_session(&self, user_id: &str) {
        self.session
            .set(&user_key(POPUP_SHOWN_PREFIX, user_id), "true")
            .await;
    }

    /// Record a dismissal in both stores.
    ///
    /// The session marker is written first and unconditionally; a failed
    /// persistent write is returned to the caller.
    pub async fn mark_first_popup_seen(&self, user_id: &str) -> Result<(), AppError> {
        self.mark_popup_shown_this_session(user_id).await;
        persistent_storage::set_value(&self.pool, &user_key(POPUP_SEEN_PREFIX, user_id), "true")
            .await
            .map_err(|e| AppError::database_with_op(e.to_string(), "mark_first_popup_seen"))
    }

    /// Forget both popup markers, so the next mount may show it again.
    pub async fn reset_first_popup(&self, user_id: &str) -> Result<(), AppError> {
        self.session.remove(&user_key(POPUP_SHOWN_PREFIX, user_id)).await;
        persistent_storage::remove_value(&self.pool, &user_key(POPUP_SEEN_PREFIX, user_id)).await?;
        Ok(())
    }

    pub async fn admin_session_active(&self, user_id: &str) -> bool {
        self.session
            .get(&user_key(ADMIN_SESSION_PREFIX, user_id))
            .await
            .is_some()
    }

    pub async fn set_admin_session(&self, user_id: &str) {
        self.session
            .set(&user_key(ADMIN_SESSION_PREFIX, user_id), "true")
            .await;
    }

    pub async fn clear_admin_session(&self, user_id: &str) {
        self.session
            .remove(&user_key(ADMIN_SESSION_PREFIX, user_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, MarkerStore) {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("markers.db")).await.unwrap();
        (dir, MarkerStore::new(pool, SessionStorage::new()))
    }

    #[tokio::test]
    async fn test_dismissal_survives_new_session() {
        let (_dir, markers) = store().await;

        assert!(!markers.first_popup_seen("u1").await.unwrap());
        markers.mark_first_popup_seen("u1").await.unwrap();
        assert!(markers.first_popup_seen("u1").await.unwrap());

        markers.end_session().await;
        assert!(markers.first_popup_seen("u1").await.unwrap());
        assert!(!markers.first_popup_seen("u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_shown_marker_is_session_scoped() {
        let (_dir, markers) = store().await;

        markers.mark_popup_shown_this_session("u1").await;
        assert!(markers.first_popup_seen("u1").await.unwrap());

        markers.end_session().await;
        assert!(!markers.first_popup_seen("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_first_popup() {
        let (_dir, markers) = store().await;

        markers.mark_first_popup_seen("u1").await.unwrap();
        markers.reset_first_popup("u1").await.unwrap();
        assert!(!markers.first_popup_seen("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_marker_lifecycle() {
        let (_dir, markers) = store().await;

        assert!(!markers.admin_session_active("admin").await);
        markers.set_admin_session("admin").await;
        assert!(markers.admin_session_active("admin").await);
        assert!(!markers.admin_session_active("other").await);

        markers.clear_admin_session("admin").await;
        assert!(!markers.admin_session_active("admin").await);

        markers.set_admin_session("admin").await;
        markers.end_session().await;
        assert!(!markers.admin_session_active("admin").await);
    }
}
