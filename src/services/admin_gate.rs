//! Admin dual-authentication gate.
//!
//! Guards the admin console. Access needs three things:
//! 1. a resolved primary identity,
//! 2. the admin role on that identity,
//! 3. a secondary admin session, re-verified against the server every time
//!    the gate is evaluated with a session marker present.
//!
//! The session marker lives in session-scoped storage and is only a hint:
//! it is cleared the moment a verification call fails or is ambiguous.

use crate::error::AppError;
use crate::models::{AuthSnapshot, User};
use crate::services::api_client::{AdminCredentials, ApiClient};
use crate::services::events::{ClientEvent, EventBus};
use crate::services::storage::MarkerStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Where the gate currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    /// Primary identity still resolving.
    Loading,

    /// Nobody is signed in; the view should redirect to login.
    NoUser,

    /// Signed in without the admin role; access denied.
    WrongRole,

    /// Admin, but the secondary credential must be entered. `expired` is
    /// set when a previous secondary session failed re-verification.
    RequireSecondaryLogin { expired: bool },

    /// Re-verifying an existing secondary session with the server.
    VerifyingSecondary,

    /// Everything checks out; render the protected views.
    Authenticated,
}

impl GateState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// A verification request other evaluations for the same user can join.
struct InFlightVerification {
    user_id: String,
    ticket: u64,
    result: Shared<BoxFuture<'static, bool>>,
}

/// Releases the in-flight slot when its waiter finishes or is dropped, so
/// an abandoned evaluation never leaves a stale answer behind for later
/// ones to join.
struct InFlightRelease<'a> {
    slot: &'a Mutex<Option<InFlightVerification>>,
    ticket: u64,
}

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|p| p.ticket == self.ticket) {
            *in_flight = None;
        }
    }
}

/// Clears the submitting flag when the submission ends, however it ends.
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The admin gate.
pub struct AdminGate {
    client: ApiClient,
    markers: MarkerStore,
    events: EventBus,
    state: RwLock<GateState>,
    user: RwLock<Option<User>>,
    /// Bumped by every evaluation; results from older evaluations are stale.
    generation: AtomicU64,
    next_ticket: AtomicU64,
    in_flight: Mutex<Option<InFlightVerification>>,
    submitting: AtomicBool,
}

impl AdminGate {
    pub fn new(client: ApiClient, markers: MarkerStore, events: EventBus) -> Self {
        Self {
            client,
            markers,
            events,
            state: RwLock::new(GateState::Loading),
            user: RwLock::new(None),
            generation: AtomicU64::new(0),
            next_ticket: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            submitting: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> GateState {
        self.state.read().await.clone()
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply `next` if `generation` is still current; returns the resulting state.
    async fn transition(&self, generation: u64, next: GateState) -> GateState {
        let mut state = self.state.write().await;
        if !self.is_current(generation) {
            return state.clone();
        }
        if *state != next {
            log::debug!("[admin-gate] {:?} -> {:?}", *state, next);
            *state = next.clone();
            self.events.emit(ClientEvent::AdminGateChanged {
                state: next.clone(),
            });
        }
        next
    }

    /// Re-evaluate the gate from the top for a primary auth snapshot.
    pub async fn evaluate(&self, auth: &AuthSnapshot) -> GateState {
        let generation = self.bump_generation();
        *self.user.write().await = auth.user.clone();

        if auth.loading {
            return self.transition(generation, GateState::Loading).await;
        }

        let Some(user) = auth.user.as_ref() else {
            return self.transition(generation, GateState::NoUser).await;
        };

        if !user.role.is_admin() {
            return self.transition(generation, GateState::WrongRole).await;
        }

        if !self.markers.admin_session_active(&user.id).await {
            return self
                .transition(generation, GateState::RequireSecondaryLogin { expired: false })
                .await;
        }

        self.transition(generation, GateState::VerifyingSecondary).await;
        let verified = self.verify_secondary(&user.id).await;

        if !verified {
            // Never trust the marker past a failed check, even if stale.
            self.markers.clear_admin_session(&user.id).await;
            log::info!("[admin-gate] Secondary session for {} failed verification", user.id);
        }

        if !self.is_current(generation) {
            log::debug!("[admin-gate] Discarding stale verification result");
            return self.state().await;
        }

        let next = if verified {
            GateState::Authenticated
        } else {
            GateState::RequireSecondaryLogin { expired: true }
        };
        self.transition(generation, next).await
    }

    /// Verify the secondary session, joining a request already in flight
    /// for the same user instead of issuing a duplicate.
    async fn verify_secondary(&self, user_id: &str) -> bool {
        let (ticket, result) = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.as_ref() {
                Some(pending) if pending.user_id == user_id => {
                    (pending.ticket, pending.result.clone())
                }
                _ => {
                    let client = self.client.clone();
                    let result = async move {
                        match client.verify_admin_session().await {
                            Ok(verified) => verified,
                            Err(e) => {
                                log::warn!("[admin-gate] Verification request failed: {}", e);
                                false
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
                    *in_flight = Some(InFlightVerification {
                        user_id: user_id.to_string(),
                        ticket,
                        result: result.clone(),
                    });
                    (ticket, result)
                }
            }
        };

        let _release = InFlightRelease {
            slot: &self.in_flight,
            ticket,
        };
        result.await
    }

    /// Submit the secondary admin credential.
    ///
    /// Only valid while the gate asks for it. A second submission while one
    /// is pending is rejected.
    pub async fn submit_secondary_login(
        &self,
        credentials: AdminCredentials,
    ) -> Result<GateState, AppError> {
        let _guard = SubmitGuard::acquire(&self.submitting)
            .ok_or_else(|| AppError::invalid_input("An admin sign-in is already in progress"))?;

        let user = self
            .user
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::authentication("Sign in before unlocking the admin console"))?;

        if !user.role.is_admin() {
            return Err(AppError::forbidden("Admin role required"));
        }

        match self.state().await {
            GateState::RequireSecondaryLogin { .. } => {}
            GateState::Authenticated => return Ok(GateState::Authenticated),
            other => {
                return Err(AppError::invalid_input(format!(
                    "Admin credentials are not expected in state {:?}",
                    other
                )))
            }
        }

        if credentials.password.is_empty() {
            return Err(AppError::invalid_input_field("Password is required", "password"));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        if !self.client.admin_login(&credentials).await? {
            log::info!("[admin-gate] Admin credentials rejected for {}", user.id);
            return Err(AppError::authentication("Invalid admin credentials"));
        }

        if !self.is_current(generation) {
            // The primary identity changed while we were waiting.
            return Ok(self.state().await);
        }

        self.markers.set_admin_session(&user.id).await;
        log::info!("[admin-gate] Secondary session established for {}", user.id);
        Ok(self.transition(generation, GateState::Authenticated).await)
    }

    /// End the secondary session. The primary session is untouched.
    pub async fn logout(&self) -> GateState {
        let generation = self.bump_generation();

        if let Err(e) = self.client.admin_logout().await {
            log::warn!("[admin-gate] Server logout failed: {}", e);
        }

        let user = self.user.read().await.clone();
        match user {
            Some(user) if user.role.is_admin() => {
                self.markers.clear_admin_session(&user.id).await;
                self.transition(generation, GateState::RequireSecondaryLogin { expired: false })
                    .await
            }
            Some(_) => self.transition(generation, GateState::WrongRole).await,
            None => self.transition(generation, GateState::NoUser).await,
        }
    }

    /// Re-evaluate whenever the primary auth snapshot changes.
    ///
    /// An evaluation still waiting on the server is abandoned as soon as a
    /// newer snapshot arrives. The task ends when the sender is dropped.
    pub fn watch(self: Arc<Self>, mut auth: watch::Receiver<AuthSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let snapshot = auth.borrow_and_update().clone();
                tokio::select! {
                    _ = self.evaluate(&snapshot) => {
                        if auth.changed().await.is_err() {
                            break;
                        }
                    }
                    changed = auth.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            log::debug!("[admin-gate] Auth watcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::api_client::ApiClientConfig;
    use crate::services::storage::SessionStorage;
    use tempfile::tempdir;

    async fn gate() -> (tempfile::TempDir, AdminGate, MarkerStore) {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("gate.db")).await.unwrap();
        let markers = MarkerStore::new(pool, SessionStorage::new());
        // Nothing listens here; these tests never reach the network.
        let client = ApiClient::new(ApiClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        let gate = AdminGate::new(client, markers.clone(), EventBus::new());
        (dir, gate, markers)
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: "Test".to_string(),
            email: format!("{}@example.edu", id),
            role,
        }
    }

    #[tokio::test]
    async fn test_loading_and_no_user() {
        let (_dir, gate, _) = gate().await;

        assert_eq!(gate.evaluate(&AuthSnapshot::loading()).await, GateState::Loading);
        assert_eq!(gate.evaluate(&AuthSnapshot::resolved(None)).await, GateState::NoUser);
    }

    #[tokio::test]
    async fn test_non_admin_denied_even_with_marker() {
        let (_dir, gate, markers) = gate().await;
        let student = user("s1", Role::Student);
        markers.set_admin_session(&student.id).await;

        let state = gate.evaluate(&AuthSnapshot::resolved(Some(student))).await;
        assert_eq!(state, GateState::WrongRole);
    }

    #[tokio::test]
    async fn test_admin_without_marker_needs_secondary_login() {
        let (_dir, gate, _) = gate().await;

        let state = gate
            .evaluate(&AuthSnapshot::resolved(Some(user("a1", Role::Admin))))
            .await;
        assert_eq!(state, GateState::RequireSecondaryLogin { expired: false });
    }

    #[tokio::test]
    async fn test_unreachable_server_clears_marker() {
        let (_dir, gate, markers) = gate().await;
        let admin = user("a1", Role::Admin);
        markers.set_admin_session(&admin.id).await;

        let state = gate.evaluate(&AuthSnapshot::resolved(Some(admin.clone()))).await;

        assert_eq!(state, GateState::RequireSecondaryLogin { expired: true });
        assert!(!markers.admin_session_active(&admin.id).await);
    }

    #[tokio::test]
    async fn test_submit_rejected_outside_login_state() {
        let (_dir, gate, _) = gate().await;
        gate.evaluate(&AuthSnapshot::resolved(Some(user("s1", Role::Student))))
            .await;

        let err = gate
            .submit_secondary_login(AdminCredentials {
                email: "s1@example.edu".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_in_flight_release_only_clears_own_ticket() {
        let slot = Mutex::new(Some(InFlightVerification {
            user_id: "a1".to_string(),
            ticket: 7,
            result: async { true }.boxed().shared(),
        }));

        drop(InFlightRelease { slot: &slot, ticket: 6 });
        assert!(slot.lock().unwrap().is_some());

        drop(InFlightRelease { slot: &slot, ticket: 7 });
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_submit_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = SubmitGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(SubmitGuard::acquire(&flag).is_none());
        drop(first);
        assert!(SubmitGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_state_serialization() {
        let json =
            serde_json::to_string(&GateState::RequireSecondaryLogin { expired: true }).unwrap();
        assert_eq!(json, r#"{"state":"require_secondary_login","expired":true}"#);
    }
}
