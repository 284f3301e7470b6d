//! Primary authentication state.
//!
//! Holds the signed-in identity in a `watch` channel so dependents (the
//! admin gate, the notification mount) react to sign-in, sign-out and role
//! changes without being rebuilt.

use crate::error::AppError;
use crate::models::{AuthSnapshot, User};
use crate::services::api_client::ApiClient;
use crate::services::credentials::CredentialService;
use crate::services::events::{ClientEvent, EventBus};
use crate::services::storage::MarkerStore;
use tokio::sync::watch;

/// Owner of the primary auth snapshot.
pub struct PrimaryAuth {
    client: ApiClient,
    markers: MarkerStore,
    events: EventBus,
    api_url: String,
    tx: watch::Sender<AuthSnapshot>,
}

impl PrimaryAuth {
    /// Start in the loading state; call `resolve` to settle it.
    pub fn new(client: ApiClient, markers: MarkerStore, events: EventBus, api_url: &str) -> Self {
        let (tx, _) = watch::channel(AuthSnapshot::loading());
        Self {
            client,
            markers,
            events,
            api_url: api_url.to_string(),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    fn publish(&self, snapshot: AuthSnapshot) {
        self.tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Load a stored session token into the client, if there is one.
    pub fn restore_session(&self) -> Result<bool, AppError> {
        match CredentialService::get_token(&self.api_url)? {
            Some(token) => {
                self.client.set_session_token(&token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolve the identity behind the current session.
    ///
    /// Any failure resolves to "no user"; a rejected session also emits
    /// `auth-expired`.
    pub async fn resolve(&self) -> Option<User> {
        self.publish(AuthSnapshot {
            loading: true,
            user: self.current_user(),
        });

        let user = match self.client.current_user().await {
            Ok(user) => {
                log::info!("[auth] Signed in as {} ({:?})", user.id, user.role);
                Some(user)
            }
            Err(e) => {
                if e.is_authentication_expired() {
                    self.events.emit(ClientEvent::AuthExpired {
                        message: e.to_string(),
                    });
                }
                log::warn!("[auth] Could not resolve current user: {}", e);
                None
            }
        };

        self.publish(AuthSnapshot::resolved(user.clone()));
        user
    }

    /// Sign in with a session token issued by the platform's login flow.
    pub async fn sign_in(&self, token: &str) -> Result<User, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::invalid_input_field("Session token is required", "token"));
        }

        self.client.set_session_token(token);
        match self.resolve().await {
            Some(user) => {
                if let Err(e) = CredentialService::store_token(&self.api_url, token) {
                    log::warn!("[auth] Session token not persisted: {}", e);
                }
                Ok(user)
            }
            None => {
                self.client.clear_session_token();
                Err(AppError::authentication("Session token was rejected"))
            }
        }
    }

    /// Sign out: forget the token and end the session-scoped storage.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.client.clear_session_token();
        self.markers.end_session().await;
        self.publish(AuthSnapshot::resolved(None));
        log::info!("[auth] Signed out");
        CredentialService::delete_token(&self.api_url)
    }
}
