//! Share enumeration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who may use a share's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_access_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Only explicitly listed principals.
    Restricted,
    /// Anyone holding the link token, including anonymous callers.
    Anyone,
}

impl AccessLevel {
    /// Return the access level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Anyone => "anyone",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = nimbus_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "restricted" => Ok(Self::Restricted),
            "anyone" => Ok(Self::Anyone),
            _ => Err(nimbus_core::AppError::validation(format!(
                "Invalid access level: '{s}'"
            ))),
        }
    }
}

/// Capability granted by a share.
///
/// Ordered by privilege: Viewer < Commenter < Editor. Only the viewer floor
/// gates anything today; the higher tiers are carried through unchanged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "share_permission", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    /// Read-only access.
    Viewer,
    /// Can add comments but not modify.
    Commenter,
    /// Can edit content and metadata.
    Editor,
}

impl Default for SharePermission {
    fn default() -> Self {
        Self::Viewer
    }
}

impl SharePermission {
    /// Check if this permission grants at least the given level.
    pub fn has_at_least(&self, required: SharePermission) -> bool {
        *self >= required
    }

    /// Return the permission as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Commenter => "commenter",
            Self::Editor => "editor",
        }
    }
}

impl fmt::Display for SharePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SharePermission {
    type Err = nimbus_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "commenter" => Ok(Self::Commenter),
            "editor" => Ok(Self::Editor),
            _ => Err(nimbus_core::AppError::validation(format!(
                "Invalid share permission: '{s}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_ordering() {
        assert!(SharePermission::Viewer < SharePermission::Commenter);
        assert!(SharePermission::Commenter < SharePermission::Editor);
        assert!(SharePermission::Editor.has_at_least(SharePermission::Viewer));
        assert!(!SharePermission::Viewer.has_at_least(SharePermission::Commenter));
        assert_eq!(SharePermission::default(), SharePermission::Viewer);
    }

    #[test]
    fn test_parse_round_trip() {
        assert_eq!(
            "Anyone".parse::<AccessLevel>().unwrap(),
            AccessLevel::Anyone
        );
        assert_eq!(
            "editor".parse::<SharePermission>().unwrap(),
            SharePermission::Editor
        );
        assert!("owner".parse::<SharePermission>().is_err());
        assert!("public".parse::<AccessLevel>().is_err());
    }
}
