//! User model
//!
//! Accounts carry a superuser flag plus a set of granted permissions.
//! Superusers implicitly hold every permission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique login name
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a not-yet-persisted user. The password must already be hashed.
    pub fn new(username: String, email: String, password_hash: String, is_superuser: bool) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            is_superuser,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Named capability required by write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddPost,
    ChangePost,
    DeletePost,
    AddCategory,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::AddPost,
        Permission::ChangePost,
        Permission::DeletePost,
        Permission::AddCategory,
    ];

    /// Stored codename
    pub fn codename(&self) -> &'static str {
        match self {
            Permission::AddPost => "add_post",
            Permission::ChangePost => "change_post",
            Permission::DeletePost => "delete_post",
            Permission::AddCategory => "add_category",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.codename() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown permission: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "reporter".to_string(),
            "reporter@example.com".to_string(),
            "hash".to_string(),
            false,
        );
        assert_eq!(user.id, 0);
        assert!(!user.is_superuser);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("a".into(), "a@b.c".into(), "secret-hash".into(), true);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"is_superuser\":true"));
    }

    #[test]
    fn test_permission_codenames() {
        for permission in Permission::ALL {
            assert_eq!(permission.codename().parse::<Permission>().unwrap(), permission);
        }
        assert_eq!(Permission::AddCategory.to_string(), "add_category");
        assert!("publish_post".parse::<Permission>().is_err());
    }
}
