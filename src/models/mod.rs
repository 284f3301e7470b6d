//! Data models for the console client.
//!
//! These models mirror the platform API's JSON payloads and are serialized
//! back out to the view layer.

pub mod envelope;
pub mod notification;
pub mod user;

// Re-exports for convenient access
pub use envelope::ApiEnvelope;
pub use notification::{
    ExperienceRef, ExperienceSummary, Notification, NotificationPresentation, NotificationType,
    Priority,
};
pub use user::{AuthSnapshot, Role, User};
