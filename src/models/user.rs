//! Primary identity model.

use serde::{Deserialize, Serialize};

/// Role attached to the primary identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Student,
    /// Any role this client does not know about.
    #[serde(untagged)]
    Other(String),
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// The authenticated user as returned by `GET /api/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

/// Snapshot of primary authentication: still resolving, or resolved to a
/// user (or to nobody).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AuthSnapshot {
    pub loading: bool,
    pub user: Option<User>,
}

impl AuthSnapshot {
    pub fn loading() -> Self {
        Self {
            loading: true,
            user: None,
        }
    }

    pub fn resolved(user: Option<User>) -> Self {
        Self {
            loading: false,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        let admin: Role = serde_json::from_str("\"Admin\"").unwrap();
        let student: Role = serde_json::from_str("\"Student\"").unwrap();
        let recruiter: Role = serde_json::from_str("\"Recruiter\"").unwrap();

        assert!(admin.is_admin());
        assert_eq!(student, Role::Student);
        assert_eq!(recruiter, Role::Other("Recruiter".to_string()));
        assert!(!recruiter.is_admin());
    }

    #[test]
    fn test_user_accepts_mongo_id() {
        let user: User =
            serde_json::from_str(r#"{"_id": "u1", "name": "Asha", "role": "Admin"}"#).unwrap();
        assert_eq!(user.id, "u1");
        assert!(user.role.is_admin());
        assert!(user.email.is_empty());
    }
}
