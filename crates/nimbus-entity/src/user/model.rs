//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user known to Nimbus.
///
/// Identities come from the external provider; this row mirrors the
/// provider's stable id and email so that shares can be addressed by email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Stable user identifier from the identity provider.
    pub id: Uuid,
    /// Email address (stored lower-cased).
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub image: Option<String>,
    /// When the user was first seen.
    pub created_at: DateTime<Utc>,
    /// When the mirrored fields last changed.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name shown to other users: the display name, else the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Identity fields mirrored from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertUser {
    /// Stable user identifier.
    pub id: Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_email() {
        let now = Utc::now();
        let mut user = User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            name: Some("  ".to_string()),
            image: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(user.display_name(), "ana@example.com");
        user.name = Some("Ana".to_string());
        assert_eq!(user.display_name(), "Ana");
    }
}
