use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// The signed-in user's profile, as returned by login and `/auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub role: Role,
    /// Projects a regular user may access. Admins see everything.
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_access(&self, project: &str) -> bool {
        self.is_admin() || self.projects.iter().any(|p| p == project)
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "active")
    }
}

/// A user record in the admin listing, keyed by username.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

/// Request body for creating or updating a user (admin only).
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_access() {
        let user: User = serde_json::from_str(
            r#"{"username": "user1", "role": "user", "projects": ["Site-1"]}"#,
        )
        .unwrap();
        assert!(!user.is_admin());
        assert!(user.can_access("Site-1"));
        assert!(!user.can_access("Site-2"));
        assert!(user.is_active());

        let admin = User {
            username: "admin".to_string(),
            role: Role::Admin,
            ..Default::default()
        };
        assert!(admin.can_access("anything"));
    }

    #[test]
    fn test_user_input_skips_unset_fields() {
        let input = UserInput {
            status: Some("inactive".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"status": "inactive"}));
    }
}
