//! Notification model.
//!
//! Notifications are created and mutated server-side; the client holds a
//! read-mostly copy of the latest page and mutates it optimistically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

/// Kind of notification. Unknown wire values map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ExperienceFlagged,
    ExperienceUnflagged,
    ExperienceApproved,
    ExperienceUnpublished,
    AdminMessage,
    #[default]
    #[serde(other)]
    Other,
}

/// Notification priority, ordered by urgency. Unknown wire values map to
/// `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Low,
    #[default]
    #[serde(other)]
    Medium,
}

impl Priority {
    /// Sort weight: urgent=4 … low=1.
    pub fn weight(self) -> u8 {
        match self {
            Self::Urgent => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

/// How a notification type is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationPresentation {
    /// Icon identifier understood by the view layer.
    pub icon: &'static str,

    /// Short human label for the type.
    pub label: &'static str,
}

/// Type → presentation table. Adding a type means adding a row here.
static PRESENTATION_TABLE: [(NotificationType, NotificationPresentation); 6] = [
    (
        NotificationType::ExperienceFlagged,
        NotificationPresentation { icon: "flag", label: "Experience flagged" },
    ),
    (
        NotificationType::ExperienceUnflagged,
        NotificationPresentation { icon: "flag-off", label: "Flag removed" },
    ),
    (
        NotificationType::ExperienceApproved,
        NotificationPresentation { icon: "check-circle", label: "Experience approved" },
    ),
    (
        NotificationType::ExperienceUnpublished,
        NotificationPresentation { icon: "eye-off", label: "Experience unpublished" },
    ),
    (
        NotificationType::AdminMessage,
        NotificationPresentation { icon: "shield", label: "Message from admin" },
    ),
    (
        NotificationType::Other,
        NotificationPresentation { icon: "bell", label: "Notification" },
    ),
];

impl NotificationType {
    pub fn presentation(self) -> NotificationPresentation {
        PRESENTATION_TABLE
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, p)| *p)
            .unwrap_or(PRESENTATION_TABLE[PRESENTATION_TABLE.len() - 1].1)
    }
}

/// Summary of the experience a notification refers to, when populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Reference to an experience: either a bare id or a populated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExperienceRef {
    Id(String),
    Summary(ExperienceSummary),
}

impl ExperienceRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Summary(summary) => &summary.id,
        }
    }
}

/// A user notification as returned by the platform API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: NotificationType,

    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,

    #[serde(default, deserialize_with = "null_as_default")]
    pub read: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_experience: Option<ExperienceRef>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Notification {
    /// Mark as read locally. An already-read item keeps its original `read_at`.
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if !self.read || self.read_at.is_none() {
            self.read = true;
            self.read_at = Some(self.read_at.unwrap_or(at));
        }
    }

    /// Enforce `read => read_at` on rows received from the server.
    ///
    /// A read row without a timestamp gets `created_at`, the earliest
    /// instant it could have been read.
    pub fn normalize(&mut self) {
        if self.read && self.read_at.is_none() {
            self.read_at = Some(self.created_at);
        }
    }

    pub fn presentation(&self) -> NotificationPresentation {
        self.kind.presentation()
    }
}

/// Display order: priority weight descending, then newest first.
pub fn display_order(a: &Notification, b: &Notification) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Sort notifications into display order in place.
pub fn sort_for_display(notifications: &mut [Notification]) {
    notifications.sort_by(display_order);
}

/// Number of unread items in a loaded page.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notification(id: &str, priority: Priority, minute: u32) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationType::Other,
            priority,
            read: false,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            read_at: None,
            related_experience: None,
            title: String::new(),
            message: String::new(),
        }
    }

    #[test]
    fn test_sort_priority_then_recency() {
        let mut items = vec![
            notification("low-new", Priority::Low, 59),
            notification("med-old", Priority::Medium, 1),
            notification("urgent", Priority::Urgent, 0),
            notification("med-new", Priority::Medium, 30),
            notification("high", Priority::High, 10),
        ];

        sort_for_display(&mut items);

        let ids: Vec<&str> = items.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["urgent", "high", "med-new", "med-old", "low-new"]);

        for pair in items.windows(2) {
            assert!(pair[0].priority.weight() >= pair[1].priority.weight());
            if pair[0].priority == pair[1].priority {
                assert!(pair[0].created_at >= pair[1].created_at);
            }
        }
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let json = r#"{
            "_id": "n1",
            "type": "experience_flagged",
            "priority": "urgent",
            "read": false,
            "createdAt": "2024-03-01T12:00:00Z",
            "relatedExperience": {"_id": "exp9", "company": "Acme"},
            "title": "Flagged",
            "message": "Your experience was flagged"
        }"#;

        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, "n1");
        assert_eq!(n.kind, NotificationType::ExperienceFlagged);
        assert_eq!(n.priority, Priority::Urgent);
        assert_eq!(n.related_experience.as_ref().map(|r| r.id()), Some("exp9"));
    }

    #[test]
    fn test_defaults_and_unknown_type() {
        let json = r#"{"id": "n2", "type": "brand_new_kind", "createdAt": "2024-03-01T12:00:00Z",
                       "relatedExperience": "exp1"}"#;

        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationType::Other);
        assert_eq!(n.priority, Priority::Medium);
        assert!(!n.read);
        assert_eq!(n.related_experience, Some(ExperienceRef::Id("exp1".to_string())));
    }

    #[test]
    fn test_null_and_unknown_fields_fall_back() {
        let json = r#"{"_id": "n3", "type": null, "priority": null, "read": null,
                       "title": null, "createdAt": "2024-03-01T12:00:00Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationType::Other);
        assert_eq!(n.priority, Priority::Medium);
        assert!(!n.read);
        assert!(n.title.is_empty());

        let normal: Priority = serde_json::from_str("\"normal\"").unwrap();
        assert_eq!(normal, Priority::Medium);
        let medium: Priority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(medium, Priority::Medium);
        assert_eq!(serde_json::to_string(&Priority::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_mark_read_sets_timestamp_once() {
        let mut n = notification("a", Priority::High, 0);
        let first = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();

        n.mark_read(first);
        n.mark_read(later);

        assert!(n.read);
        assert_eq!(n.read_at, Some(first));
    }

    #[test]
    fn test_normalize_fills_missing_read_at() {
        let mut n = notification("a", Priority::Low, 5);
        n.read = true;
        n.normalize();
        assert_eq!(n.read_at, Some(n.created_at));
    }

    #[test]
    fn test_every_type_has_presentation() {
        assert_eq!(NotificationType::ExperienceFlagged.presentation().icon, "flag");
        assert_eq!(NotificationType::AdminMessage.presentation().icon, "shield");
        assert_eq!(NotificationType::Other.presentation().label, "Notification");
    }

    #[test]
    fn test_unread_count() {
        let mut items = vec![
            notification("a", Priority::Low, 0),
            notification("b", Priority::Low, 1),
        ];
        items[0].mark_read(Utc::now());
        assert_eq!(unread_count(&items), 1);
    }
}
