//! Single-node structural operations: create folder, rename, move, star.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::{NodeStore, ShareStore};
use nimbus_entity::node::{NewNode, Node, NodeKind};

use super::naming::normalize_name;
use super::walk::is_descendant;
use crate::content::ContentManager;
use crate::context::RequestContext;
use crate::storage::QuotaService;

/// The Tree Integrity Engine.
///
/// Validates and performs every structural mutation of an owner's tree.
/// Checks made here are advisory; the Entity Store re-validates sibling
/// uniqueness, parent liveness, and acyclicity at write time, and every
/// single-node write is guarded by the node's `version`.
#[derive(Clone)]
pub struct TreeService {
    /// Node store.
    pub(super) nodes: Arc<dyn NodeStore>,
    /// Share store (purge cascade).
    pub(super) shares: Arc<dyn ShareStore>,
    /// Content reference manager.
    pub(super) content: Arc<ContentManager>,
    /// Quota checks for duplicate.
    pub(super) quota: Arc<QuotaService>,
}

impl std::fmt::Debug for TreeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeService").finish()
    }
}

pub(super) fn name_taken(kind: NodeKind, name: &str) -> AppError {
    AppError::name_conflict(format!("A {kind} named '{name}' already exists here"))
}

impl TreeService {
    /// Creates a new tree service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        shares: Arc<dyn ShareStore>,
        content: Arc<ContentManager>,
        quota: Arc<QuotaService>,
    ) -> Self {
        Self {
            nodes,
            shares,
            content,
            quota,
        }
    }

    /// Fetch a node of the caller in any state. Foreign nodes are `NotFound`.
    pub async fn owned_node(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Node> {
        self.nodes
            .find_by_id(node_id)
            .await?
            .filter(|n| n.is_owned_by(ctx.user_id))
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    /// Fetch a live node of the caller.
    pub async fn owned_live_node(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Node> {
        let node = self.owned_node(ctx, node_id).await?;
        if node.is_trashed() {
            return Err(AppError::not_found("File not found"));
        }
        Ok(node)
    }

    /// Fetch a live folder of the caller to place something into.
    pub(crate) async fn owned_live_folder(
        &self,
        ctx: &RequestContext,
        folder_id: Uuid,
    ) -> AppResult<Node> {
        self.nodes
            .find_by_id(folder_id)
            .await?
            .filter(|n| n.is_owned_by(ctx.user_id) && n.is_live() && n.is_folder)
            .ok_or_else(|| AppError::not_found("Parent folder not found"))
    }

    /// Create a folder under `parent_id` (None = root).
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Node> {
        let name = normalize_name(name)?;
        if let Some(parent_id) = parent_id {
            self.owned_live_folder(ctx, parent_id).await?;
        }
        if self
            .nodes
            .find_sibling_by_name(ctx.user_id, parent_id, NodeKind::Folder, &name, None)
            .await?
            .is_some()
        {
            return Err(name_taken(NodeKind::Folder, &name));
        }

        let folder = self
            .nodes
            .insert(&NewNode::folder(ctx.user_id, parent_id, name))
            .await?;

        info!(
            user_id = %ctx.user_id,
            node_id = %folder.id,
            name = %folder.name,
            "Folder created"
        );
        Ok(folder)
    }

    /// Rename a live node. Renaming to the current name is a no-op.
    pub async fn rename(&self, ctx: &RequestContext, node_id: Uuid, new_name: &str) -> AppResult<Node> {
        let node = self.owned_live_node(ctx, node_id).await?;
        let name = normalize_name(new_name)?;
        if name == node.name {
            return Ok(node);
        }

        if self
            .nodes
            .find_sibling_by_name(node.owner_id, node.parent_id, node.kind(), &name, Some(node.id))
            .await?
            .is_some()
        {
            return Err(name_taken(node.kind(), &name));
        }

        let renamed = self.nodes.rename(node.id, node.version, &name).await?;
        info!(
            user_id = %ctx.user_id,
            node_id = %node.id,
            from = %node.name,
            to = %renamed.name,
            "Node renamed"
        );
        Ok(renamed)
    }

    /// Move a live node under `new_parent_id` (None = root), keeping its name.
    pub async fn move_node(
        &self,
        ctx: &RequestContext,
        node_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Node> {
        let node = self.owned_live_node(ctx, node_id).await?;
        if node.parent_id == new_parent_id {
            return Ok(node);
        }

        if let Some(target_id) = new_parent_id {
            if target_id == node.id {
                return Err(AppError::invalid_operation("Cannot move a folder into itself"));
            }
            if node.is_folder && is_descendant(self.nodes.as_ref(), node.id, target_id).await? {
                return Err(AppError::invalid_operation(
                    "Cannot move a folder into its own subfolder",
                ));
            }
            self.owned_live_folder(ctx, target_id)
                .await
                .map_err(|_| AppError::not_found("Destination folder not found"))?;
        }

        if self
            .nodes
            .find_sibling_by_name(node.owner_id, new_parent_id, node.kind(), &node.name, Some(node.id))
            .await?
            .is_some()
        {
            return Err(name_taken(node.kind(), &node.name));
        }

        let moved = self
            .nodes
            .set_parent(node.id, node.version, new_parent_id, &node.name)
            .await?;
        info!(
            user_id = %ctx.user_id,
            node_id = %node.id,
            from = ?node.parent_id,
            to = ?new_parent_id,
            "Node moved"
        );
        Ok(moved)
    }

    /// Set or clear the starred flag of a live node.
    pub async fn set_starred(&self, ctx: &RequestContext, node_id: Uuid, starred: bool) -> AppResult<Node> {
        let node = self.owned_live_node(ctx, node_id).await?;
        if node.is_starred == starred {
            return Ok(node);
        }
        self.nodes.set_starred(node.id, node.version, starred).await
    }
}
