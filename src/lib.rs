//! Placement Console - client core for the placement experience platform.
//!
//! This library holds everything the console's views need besides markup:
//! the platform API client, notification polling with the first-time
//! popup, and the admin dual-authentication gate. A view layer drives it
//! through the functions in [`commands`] and listens on [`services::EventBus`].

pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use app::AppState;
pub use error::AppError;
