//! Business logic services.
//!
//! This module contains the client core: talking to the platform API,
//! per-user storage, primary auth, the admin gate and the notification
//! synchronizer.
//!
//! Services are independent of any particular view layer.

pub mod admin_gate;
pub mod api_client;
pub mod credentials;
pub mod events;
pub mod notification_sync;
pub mod primary_auth;
pub mod storage;

pub use admin_gate::{AdminGate, GateState};
pub use api_client::ApiClient;
pub use credentials::CredentialService;
pub use events::{ClientEvent, EventBus};
pub use notification_sync::{NotificationSync, SyncHandle};
pub use primary_auth::PrimaryAuth;
pub use storage::{MarkerStore, SessionStorage};
