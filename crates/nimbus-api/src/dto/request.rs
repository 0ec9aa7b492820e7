//! Request DTOs and query strings.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_entity::share::{AccessLevel, SharePermission};

/// Create folder request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderRequest {
    /// Folder name.
    pub name: String,
    /// Parent folder (absent or null = root).
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<Uuid>,
}

/// Rename and/or move a node.
///
/// `parent_id` distinguishes "absent" (stay put) from `null` (move to root).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNodeRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New parent.
    #[serde(default, alias = "parentId", deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

/// Star toggle.
#[derive(Debug, Clone, Deserialize)]
pub struct StarRequest {
    #[serde(alias = "isStarred")]
    pub is_starred: bool,
}

/// Link share settings. Unspecified fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLinkShareRequest {
    #[serde(default, alias = "accessLevel")]
    pub access_level: Option<AccessLevel>,
    #[serde(default)]
    pub permission: Option<SharePermission>,
}

/// Add named grantees.
#[derive(Debug, Clone, Deserialize)]
pub struct AddPeopleRequest {
    pub emails: Vec<String>,
    #[serde(default = "default_permission")]
    pub permission: SharePermission,
}

fn default_permission() -> SharePermission {
    SharePermission::Viewer
}

/// Change one grantee's permission.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePersonRequest {
    pub permission: SharePermission,
}

/// Begin a direct upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrlRequest {
    pub name: String,
    #[serde(alias = "mimeType", alias = "type")]
    pub mime_type: String,
    pub size: i64,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<Uuid>,
}

/// Confirm a direct upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadCompleteRequest {
    #[serde(alias = "nodeId", alias = "fileId")]
    pub node_id: Uuid,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

/// `GET /api/files` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
    #[serde(default, rename = "type")]
    pub category: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub recursive: Option<bool>,
}

impl ListParams {
    /// The folder to list. Empty, `null`, and `root` all mean the root.
    pub fn parent(&self) -> Result<Option<Uuid>, AppError> {
        optional_id(self.parent_id.as_deref(), "parentId")
    }
}

/// `GET /api/files/search` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default, alias = "includeDeleted")]
    pub include_deleted: Option<bool>,
}

/// `GET /api/files/path` query string.
#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    #[serde(alias = "fileId")]
    pub file_id: Uuid,
}

/// Parse an optional id from a query value.
pub fn optional_id(raw: Option<&str>, field: &str) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") | Some("root") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::validation(format!("Invalid {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_absent_from_null_parent() {
        let absent: UpdateNodeRequest = serde_json::from_str(r#"{"name":"a"}"#).unwrap();
        assert_eq!(absent.parent_id, None);

        let root: UpdateNodeRequest = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(root.parent_id, Some(None));

        let id = Uuid::new_v4();
        let moved: UpdateNodeRequest =
            serde_json::from_str(&format!(r#"{{"parentId":"{id}"}}"#)).unwrap();
        assert_eq!(moved.parent_id, Some(Some(id)));
    }

    #[test]
    fn test_root_aliases_parse_to_none() {
        for raw in [None, Some(""), Some("null"), Some("root")] {
            assert_eq!(optional_id(raw, "parentId").unwrap(), None);
        }
        assert!(optional_id(Some("nope"), "parentId").is_err());
    }
}
