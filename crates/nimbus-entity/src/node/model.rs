//! Node entity model: one row per file or folder.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Whether a node is a file or a folder.
///
/// Sibling names are unique per kind, so a file and a folder may share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A content-bearing file.
    File,
    /// A folder; carries no content.
    Folder,
}

impl NodeKind {
    /// Map the `is_folder` column to a kind.
    pub fn from_is_folder(is_folder: bool) -> Self {
        if is_folder { Self::Folder } else { Self::File }
    }

    /// Whether this kind is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file or folder in an owner's tree.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Node {
    /// Unique node identifier.
    pub id: Uuid,
    /// User who created the node. Never changes.
    pub owner_id: Uuid,
    /// Parent folder (None = root).
    pub parent_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Whether this node is a folder.
    pub is_folder: bool,
    /// Object store key; None for folders and for files whose upload is not committed.
    #[serde(skip_serializing, default)]
    pub content_ref: Option<String>,
    /// Key the upload grant was issued for, kept from reservation until the
    /// content is committed.
    #[serde(skip_serializing, default)]
    pub upload_key: Option<String>,
    /// Content size in bytes (0 for folders).
    pub size: i64,
    /// MIME type (empty for folders).
    pub mime_type: String,
    /// Whether the owner starred the node.
    pub is_starred: bool,
    /// Optimistic concurrency counter, bumped on every single-node write.
    pub version: i64,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last modified.
    pub updated_at: DateTime<Utc>,
    /// When the content was last downloaded.
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// When the node was moved to trash.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Whether the node is not in trash.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Whether the node is in trash.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Return the node kind.
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_is_folder(self.is_folder)
    }

    /// Whether the given user owns this node.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Whether the node is a file with committed content.
    pub fn has_content(&self) -> bool {
        !self.is_folder && self.content_ref.is_some()
    }

    /// Whether the node is a file reserved for an upload that never committed.
    pub fn is_pending_upload(&self) -> bool {
        !self.is_folder && self.content_ref.is_none()
    }
}

/// Data required to insert a new node.
///
/// The id is chosen by the caller so that a content key derived from it can
/// be written before the row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    /// Node identifier.
    pub id: Uuid,
    /// Owner.
    pub owner_id: Uuid,
    /// Parent folder.
    pub parent_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Whether this is a folder.
    pub is_folder: bool,
    /// Object store key (files only).
    pub content_ref: Option<String>,
    /// Key reserved for a direct upload.
    pub upload_key: Option<String>,
    /// Content size in bytes.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Initial starred flag.
    pub is_starred: bool,
}

impl NewNode {
    /// Describe a new folder.
    pub fn folder(owner_id: Uuid, parent_id: Option<Uuid>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            parent_id,
            name: name.into(),
            is_folder: true,
            content_ref: None,
            upload_key: None,
            size: 0,
            mime_type: String::new(),
            is_starred: false,
        }
    }

    /// Describe a new file whose content may not be committed yet.
    pub fn file(
        id: Uuid,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            id,
            owner_id,
            parent_id,
            name: name.into(),
            is_folder: false,
            content_ref: None,
            upload_key: None,
            size,
            mime_type: mime_type.into(),
            is_starred: false,
        }
    }

    /// Attach a content reference.
    pub fn with_content_ref(mut self, key: impl Into<String>) -> Self {
        self.content_ref = Some(key.into());
        self
    }

    /// Reserve the key a direct upload will write to.
    pub fn with_upload_key(mut self, key: impl Into<String>) -> Self {
        self.upload_key = Some(key.into());
        self
    }

    /// Return the node kind.
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_is_folder(self.is_folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_folder_has_no_content() {
        let folder = NewNode::folder(Uuid::new_v4(), None, "Projects");
        assert!(folder.is_folder);
        assert_eq!(folder.size, 0);
        assert!(folder.content_ref.is_none());
        assert!(folder.mime_type.is_empty());
        assert_eq!(folder.kind(), NodeKind::Folder);
    }

    #[test]
    fn test_content_ref_not_serialized() {
        let now = Utc::now();
        let node = Node {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            parent_id: None,
            name: "a.txt".to_string(),
            is_folder: false,
            content_ref: Some("files/u/n.txt".to_string()),
            upload_key: Some("files/u/n.txt".to_string()),
            size: 3,
            mime_type: "text/plain".to_string(),
            is_starred: false,
            version: 0,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            deleted_at: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("content_ref").is_none());
        assert!(json.get("upload_key").is_none());
        assert_eq!(json["name"], "a.txt");
        assert!(node.has_content());
        assert!(node.is_live());
    }
}
