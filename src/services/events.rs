//! Client events for the view layer.
//!
//! Services publish these on an `EventBus` so the view layer can update
//! reactively instead of polling the services' state.

use crate::services::admin_gate::GateState;
use serde::Serialize;
use tokio::sync::broadcast;

/// Event: notifications-updated
/// Emitted when the local notification list changes (fetch or local action).
pub const NOTIFICATIONS_UPDATED_EVENT: &str = "notifications-updated";

/// Event: first-time-popup
/// Emitted when the first-time "you have new notifications" popup opens or closes.
pub const FIRST_TIME_POPUP_EVENT: &str = "first-time-popup";

/// Event: admin-gate-changed
/// Emitted when the admin gate moves to a new state.
pub const ADMIN_GATE_CHANGED_EVENT: &str = "admin-gate-changed";

/// Event: auth-expired
/// Emitted when the server rejects the primary session.
pub const AUTH_EXPIRED_EVENT: &str = "auth-expired";

/// Capacity of the broadcast channel; slow subscribers skip old events.
const EVENT_CAPACITY: usize = 64;

/// Why the notification list changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Fetch,
    MarkedRead,
    Deleted,
}

/// An event published to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    NotificationsUpdated {
        source: UpdateSource,
        unread_count: usize,
        total: usize,
    },
    FirstTimePopup {
        visible: bool,
        unread_count: usize,
    },
    AdminGateChanged {
        state: GateState,
    },
    AuthExpired {
        message: String,
    },
}

impl ClientEvent {
    /// Event name, as used by the view layer's listeners.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotificationsUpdated { .. } => NOTIFICATIONS_UPDATED_EVENT,
            Self::FirstTimePopup { .. } => FIRST_TIME_POPUP_EVENT,
            Self::AdminGateChanged { .. } => ADMIN_GATE_CHANGED_EVENT,
            Self::AuthExpired { .. } => AUTH_EXPIRED_EVENT,
        }
    }
}

/// Fan-out channel for client events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn emit(&self, event: ClientEvent) {
        log::debug!("[events] {}", event.name());
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_serialized_tag() {
        let event = ClientEvent::FirstTimePopup {
            visible: true,
            unread_count: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"first-time-popup\""));
        assert_eq!(event.name(), FIRST_TIME_POPUP_EVENT);
    }

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let bus = EventBus::new();
        bus.emit(ClientEvent::AuthExpired {
            message: "dropped".to_string(),
        });

        let mut rx = bus.subscribe();
        bus.emit(ClientEvent::AuthExpired {
            message: "expired".to_string(),
        });

        match rx.recv().await.unwrap() {
            ClientEvent::AuthExpired { message } => assert_eq!(message, "expired"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
