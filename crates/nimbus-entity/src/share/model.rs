//! Share entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::access::{AccessLevel, SharePermission};

/// A capability grant on exactly one node.
///
/// A share is either link-carrying (holds `token`, at most one per node) or a
/// named grant (targets `shared_with_user_id` or `shared_with_email`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Share {
    /// Unique share identifier.
    pub id: Uuid,
    /// The shared node.
    pub node_id: Uuid,
    /// Owner who created the grant.
    pub grantor_id: Uuid,
    /// Who may use the link.
    pub access_level: AccessLevel,
    /// Capability granted.
    pub permission: SharePermission,
    /// Link token; minted once and never regenerated.
    pub token: Option<String>,
    /// Named grant target: a known user.
    pub shared_with_user_id: Option<Uuid>,
    /// Named grant target: an address without an account.
    pub shared_with_email: Option<String>,
    /// When the share stops granting access.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
    /// When the share was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Share {
    /// Whether this is the node's link-carrying share.
    pub fn is_link(&self) -> bool {
        self.token.is_some()
    }

    /// Whether this share targets a specific principal.
    pub fn is_named(&self) -> bool {
        self.shared_with_user_id.is_some() || self.shared_with_email.is_some()
    }

    /// Check if the share has expired at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Check if the share currently grants anything.
    pub fn is_valid(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }

    /// Whether the named grant matches a principal's id or (case-insensitive) email.
    pub fn targets(&self, user_id: Uuid, email: &str) -> bool {
        if self.shared_with_user_id == Some(user_id) {
            return true;
        }
        match &self.shared_with_email {
            Some(target) => !email.is_empty() && target.eq_ignore_ascii_case(email),
            None => false,
        }
    }
}

/// The principal a named grant is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum GrantTarget {
    /// An address that resolved to a registered user.
    User(Uuid),
    /// An address with no account yet (stored lower-cased).
    Email(String),
}

/// Data required to create a new share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShare {
    /// The shared node.
    pub node_id: Uuid,
    /// Owner creating the grant.
    pub grantor_id: Uuid,
    /// Link access level.
    pub access_level: AccessLevel,
    /// Permission level.
    pub permission: SharePermission,
    /// Link token (link-carrying share only).
    pub token: Option<String>,
    /// Named grant target (named grants only).
    pub target: Option<GrantTarget>,
    /// Expiry time (None = never).
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewShare {
    /// Describe a link-carrying share.
    pub fn link(
        node_id: Uuid,
        grantor_id: Uuid,
        access_level: AccessLevel,
        permission: SharePermission,
        token: String,
    ) -> Self {
        Self {
            node_id,
            grantor_id,
            access_level,
            permission,
            token: Some(token),
            target: None,
            expires_at: None,
        }
    }

    /// Describe a named grant.
    pub fn named(
        node_id: Uuid,
        grantor_id: Uuid,
        target: GrantTarget,
        permission: SharePermission,
    ) -> Self {
        Self {
            node_id,
            grantor_id,
            access_level: AccessLevel::Restricted,
            permission,
            token: None,
            target: Some(target),
            expires_at: None,
        }
    }

    /// Target user id, if the grant resolved to a user.
    pub fn shared_with_user_id(&self) -> Option<Uuid> {
        match &self.target {
            Some(GrantTarget::User(id)) => Some(*id),
            _ => None,
        }
    }

    /// Target address, if the grant is to an unregistered email.
    pub fn shared_with_email(&self) -> Option<&str> {
        match &self.target {
            Some(GrantTarget::Email(email)) => Some(email.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn named_share(user: Option<Uuid>, email: Option<&str>) -> Share {
        let now = Utc::now();
        Share {
            id: Uuid::new_v4(),
            node_id: Uuid::new_v4(),
            grantor_id: Uuid::new_v4(),
            access_level: AccessLevel::Restricted,
            permission: SharePermission::Viewer,
            token: None,
            shared_with_user_id: user,
            shared_with_email: email.map(String::from),
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_targets_by_id_or_email() {
        let user = Uuid::new_v4();
        let by_id = named_share(Some(user), None);
        assert!(by_id.targets(user, "someone@x.com"));
        assert!(!by_id.targets(Uuid::new_v4(), "someone@x.com"));

        let by_email = named_share(None, Some("user2@x.com"));
        assert!(by_email.targets(Uuid::new_v4(), "User2@X.com"));
        assert!(!by_email.targets(Uuid::new_v4(), ""));
    }

    #[test]
    fn test_expiry() {
        let mut share = named_share(None, Some("a@b.c"));
        assert!(share.is_valid());
        share.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(!share.is_valid());
        share.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(share.is_valid());
    }

    #[test]
    fn test_new_named_is_restricted() {
        let share = NewShare::named(
            Uuid::new_v4(),
            Uuid::new_v4(),
            GrantTarget::Email("x@y.z".to_string()),
            SharePermission::Editor,
        );
        assert_eq!(share.access_level, AccessLevel::Restricted);
        assert!(share.token.is_none());
        assert_eq!(share.shared_with_email(), Some("x@y.z"));
        assert_eq!(share.shared_with_user_id(), None);
    }
}
