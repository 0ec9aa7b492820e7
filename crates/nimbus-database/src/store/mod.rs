//! The Entity Store query contract.
//!
//! Services are written against these traits, never against a concrete
//! backend. Every write re-validates the tree invariants at write time:
//! sibling-name uniqueness surfaces as `NameConflict`, a lost optimistic
//! version check as `Conflict`, and a parent that is no longer a live folder
//! of the same owner as `NotFound` (insert) or `Conflict` (move).

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use nimbus_core::result::AppResult;
use nimbus_entity::node::{NewNode, Node, NodeKind, TypeCategory};
use nimbus_entity::share::{AccessLevel, GrantTarget, NewShare, Share, SharePermission};
use nimbus_entity::user::{UpsertUser, User};

pub use memory::MemoryStore;

/// Which lifecycle state a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// `deleted_at IS NULL`.
    Live,
    /// `deleted_at IS NOT NULL`.
    Trashed,
    /// Both.
    Any,
}

impl Liveness {
    /// Whether a node in the given state is included.
    pub fn admits(&self, node: &Node) -> bool {
        match self {
            Self::Live => node.is_live(),
            Self::Trashed => node.is_trashed(),
            Self::Any => true,
        }
    }
}

/// Criteria for an owner-scoped listing of live nodes.
#[derive(Debug, Clone)]
pub struct NodeFilter {
    /// Owner whose nodes are listed.
    pub owner_id: Uuid,
    /// Folder to list (None = root).
    pub parent_id: Option<Uuid>,
    /// Include the whole live subtree instead of direct children.
    pub recursive: bool,
    /// Restrict to a MIME category.
    pub category: Option<TypeCategory>,
    /// Only nodes updated at or after this instant.
    pub updated_from: Option<DateTime<Utc>>,
    /// Only nodes updated before this instant.
    pub updated_before: Option<DateTime<Utc>>,
}

impl NodeFilter {
    /// Direct live children of a folder, unfiltered.
    pub fn children_of(owner_id: Uuid, parent_id: Option<Uuid>) -> Self {
        Self {
            owner_id,
            parent_id,
            recursive: false,
            category: None,
            updated_from: None,
            updated_before: None,
        }
    }

    /// Whether a node passes the category and time predicates.
    pub fn admits(&self, node: &Node) -> bool {
        if let Some(category) = self.category {
            if !category.matches(node.is_folder, &node.mime_type) {
                return false;
            }
        }
        if let Some(from) = self.updated_from {
            if node.updated_at < from {
                return false;
            }
        }
        if let Some(before) = self.updated_before {
            if node.updated_at >= before {
                return false;
            }
        }
        true
    }
}

/// Sort key shared by every listing: folders first, then newest first.
pub fn folders_first_by<F>(nodes: &mut [Node], key: F)
where
    F: Fn(&Node) -> DateTime<Utc>,
{
    nodes.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then_with(|| key(b).cmp(&key(a))));
}

/// Persistence of files and folders.
#[async_trait]
pub trait NodeStore: Send + Sync + 'static {
    /// Find a node in any state.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Node>>;

    /// Find several nodes in any state. Missing ids are skipped.
    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Node>>;

    /// Find the live sibling of the given kind carrying `name`, ignoring `exclude`.
    async fn find_sibling_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Node>>;

    /// Names of the live siblings of one kind under a parent.
    async fn sibling_names(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        kind: NodeKind,
    ) -> AppResult<Vec<String>>;

    /// Direct children of a folder in the requested state.
    async fn list_children(&self, parent_id: Uuid, liveness: Liveness) -> AppResult<Vec<Node>>;

    /// Live nodes matching a filter, folders first then `created_at` desc.
    async fn list_filtered(&self, filter: &NodeFilter) -> AppResult<Vec<Node>>;

    /// All trashed nodes of an owner, folders first then `deleted_at` desc.
    async fn list_trash(&self, owner_id: Uuid) -> AppResult<Vec<Node>>;

    /// Live starred nodes of an owner, folders first then `updated_at` desc.
    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<Node>>;

    /// Case-insensitive substring search on names.
    async fn search(
        &self,
        owner_id: Uuid,
        needle: &str,
        include_deleted: bool,
        limit: i64,
    ) -> AppResult<Vec<Node>>;

    /// Insert a node. The parent must be a live folder of the same owner.
    async fn insert(&self, node: &NewNode) -> AppResult<Node>;

    /// Rename a live node if its version still matches.
    async fn rename(&self, id: Uuid, expected_version: i64, name: &str) -> AppResult<Node>;

    /// Re-parent a live node (carrying `name`) if its version still matches.
    ///
    /// Re-checks at write time that the target is a live folder of the same
    /// owner and that the node is not among the target's ancestors.
    async fn set_parent(
        &self,
        id: Uuid,
        expected_version: i64,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Node>;

    /// Set the starred flag of a live node if its version still matches.
    async fn set_starred(&self, id: Uuid, expected_version: i64, starred: bool) -> AppResult<Node>;

    /// Move a live node to trash. Returns false when it was already trashed.
    async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    /// Bring a trashed node back under `parent_id` with `name`.
    ///
    /// Returns None when the node is no longer trashed or the parent stopped
    /// being a live folder of the owner.
    async fn mark_restored(
        &self,
        id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Node>>;

    /// Record committed content on a live file.
    async fn commit_content(&self, id: Uuid, content_ref: &str, size: i64) -> AppResult<Node>;

    /// Stamp the last download time.
    async fn touch_accessed(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Destroy a trashed row. Returns false when no trashed row matched.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Live files of an owner still waiting for their upload, reserved
    /// before `created_before`, oldest first.
    async fn list_pending_uploads(
        &self,
        owner_id: Uuid,
        created_before: DateTime<Utc>,
    ) -> AppResult<Vec<Node>>;

    /// Destroy a file row whose content was never committed. Returns false
    /// when the row is gone or has been committed meanwhile.
    async fn discard_pending_upload(&self, id: Uuid) -> AppResult<bool>;

    /// Live-file byte sum and count for an owner.
    async fn usage(&self, owner_id: Uuid) -> AppResult<(i64, i64)>;
}

/// Persistence of capability grants.
#[async_trait]
pub trait ShareStore: Send + Sync + 'static {
    /// Find a share by id.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>>;

    /// The node's link-carrying share, if a link was ever minted.
    async fn find_link_share(&self, node_id: Uuid) -> AppResult<Option<Share>>;

    /// Look up the link-carrying share holding `token`.
    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>>;

    /// Every share on a node, oldest first.
    async fn list_for_node(&self, node_id: Uuid) -> AppResult<Vec<Share>>;

    /// The named grant for exactly one target on a node.
    async fn find_named_grant(&self, node_id: Uuid, target: &GrantTarget)
    -> AppResult<Option<Share>>;

    /// Named grants on a node matching a principal's id or email.
    async fn find_grants_for_principal(
        &self,
        node_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> AppResult<Vec<Share>>;

    /// Insert a share. A second link-carrying share on one node is a `Conflict`.
    async fn insert(&self, share: &NewShare) -> AppResult<Share>;

    /// Change the access level and permission of a link-carrying share.
    async fn update_link(
        &self,
        id: Uuid,
        access_level: AccessLevel,
        permission: SharePermission,
    ) -> AppResult<Share>;

    /// Change the permission of a share.
    async fn update_permission(&self, id: Uuid, permission: SharePermission) -> AppResult<Share>;

    /// Delete a share. Returns false when it did not exist.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Delete every share on a node, returning how many were removed.
    async fn delete_for_node(&self, node_id: Uuid) -> AppResult<u64>;

    /// Named grants addressed to a principal, across all nodes.
    async fn list_shared_with(&self, user_id: Uuid, email: &str) -> AppResult<Vec<Share>>;
}

/// Users mirrored from the identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Find a user by id.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by email, ignoring case.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Create or refresh a user row.
    async fn upsert(&self, user: &UpsertUser) -> AppResult<User>;
}
