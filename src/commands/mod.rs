//! Command handlers for the view layer.
//!
//! Every user-facing action enters the client through one of these
//! functions. Commands are organized by functionality:
//! - `auth`: primary sign-in and sign-out
//! - `notifications`: the notification list, popup and browser triggers
//! - `admin`: the admin gate and secondary login
//! - `settings`: client configuration

pub mod admin;
pub mod auth;
pub mod notifications;
pub mod settings;

pub use admin::{admin_logout, get_admin_gate_state, submit_admin_login};
pub use auth::{get_current_user, sign_in, sign_out};
pub use notifications::{
    delete_all_notifications, delete_notification, dismiss_first_time_popup, get_notifications,
    mark_all_notifications_read, mark_notification_read, refresh_notifications,
    reset_first_time_popup, visibility_changed, window_focused,
};
pub use settings::{get_settings, update_settings};
