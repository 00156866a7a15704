//! Admin user model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An admin account. Every account has full access to the admin area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Login identifier (unique)
    pub email: String,
    pub display_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user. The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(email: String, display_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            email,
            display_name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new(
            "admin@example.com".to_string(),
            "Admin".to_string(),
            "$argon2id$secret".to_string(),
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("admin@example.com"));
        assert!(!json.contains("argon2id"));
    }
}
