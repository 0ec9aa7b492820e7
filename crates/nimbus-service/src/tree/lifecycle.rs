//! Trash lifecycle: soft-delete, restore, and permanent purge.
//!
//! Each transition is a sequential walk over the affected subtree with
//! state-guarded writes, so re-running an interrupted operation only
//! touches the nodes it did not reach the first time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_database::Liveness;
use nimbus_entity::node::Node;

use super::naming::available_name;
use super::service::TreeService;
use super::walk::collect_subtree;
use crate::context::RequestContext;

/// Attempts at re-resolving a restore name lost to a concurrent writer.
const RESTORE_NAME_ATTEMPTS: usize = 3;

/// What a permanent purge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Rows destroyed.
    pub purged: usize,
    /// Content objects deleted.
    pub released: usize,
    /// Content objects whose delete failed and were left behind.
    pub orphaned: usize,
    /// Live descendants moved to the root instead of being destroyed.
    pub detached: usize,
}

impl TreeService {
    /// Move a live node and its live subtree to trash.
    ///
    /// Descendants are trashed before their parents and the whole operation
    /// shares one timestamp. Returns how many nodes changed state; calling it
    /// on a node that is already trashed changes nothing.
    pub async fn soft_delete(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<usize> {
        let node = self.owned_node(ctx, node_id).await?;
        if node.is_trashed() {
            return Ok(0);
        }

        let at = Utc::now();
        let subtree = collect_subtree(self.nodes.as_ref(), node, Liveness::Live).await?;
        let mut trashed = 0;
        for member in subtree.iter().rev() {
            if self.nodes.mark_deleted(member.id, at).await? {
                trashed += 1;
            }
        }

        info!(
            user_id = %ctx.user_id,
            node_id = %node_id,
            trashed,
            "Moved to trash"
        );
        Ok(trashed)
    }

    /// Bring a trashed node back, together with the descendants trashed in
    /// the same or a later action.
    ///
    /// The node returns to its parent when that parent is still a live
    /// folder, else to the root. Restored nodes whose name is taken by a live
    /// sibling are renamed with the duplicate naming scheme.
    pub async fn restore(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Node> {
        let node = self.owned_node(ctx, node_id).await?;
        let Some(deleted_at) = node.deleted_at else {
            return Err(AppError::invalid_operation("File is not in trash"));
        };

        let target = match node.parent_id {
            Some(parent_id) => self
                .nodes
                .find_by_id(parent_id)
                .await?
                .filter(|p| p.is_live() && p.is_folder && p.owner_id == node.owner_id)
                .map(|p| p.id),
            None => None,
        };

        let restored = self.restore_one(&node, target).await?;
        let mut count = 1;
        let mut frontier = Vec::new();
        if restored.is_folder {
            frontier.push(restored.id);
        }

        // Top-down: a parent is live before any of its children are revived.
        while let Some(folder_id) = frontier.pop() {
            for child in self.nodes.list_children(folder_id, Liveness::Trashed).await? {
                if !was_trashed_with(&child, deleted_at) {
                    continue;
                }
                let child = self.restore_one(&child, Some(folder_id)).await?;
                count += 1;
                if child.is_folder {
                    frontier.push(child.id);
                }
            }
        }

        info!(
            user_id = %ctx.user_id,
            node_id = %node_id,
            restored = count,
            parent_id = ?restored.parent_id,
            "Restored from trash"
        );
        Ok(restored)
    }

    /// Permanently destroy a trashed node and its trashed subtree.
    ///
    /// Children are purged before parents. Content release is best-effort:
    /// a failed delete is logged and the row is destroyed anyway. Every
    /// share on a purged node goes with it.
    pub async fn purge(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<PurgeReport> {
        let node = self.owned_node(ctx, node_id).await?;
        if node.is_live() {
            return Err(AppError::invalid_operation(
                "Only items in trash can be permanently deleted",
            ));
        }

        let subtree = collect_subtree(self.nodes.as_ref(), node, Liveness::Trashed).await?;
        let mut report = PurgeReport::default();

        for member in subtree.iter().rev() {
            if member.is_folder {
                report.detached += self.detach_live_children(member).await?;
            }
            if let Some(key) = member.content_ref.as_deref() {
                if self.content.release_content(key).await.is_released() {
                    report.released += 1;
                } else {
                    report.orphaned += 1;
                }
            }
            self.shares.delete_for_node(member.id).await?;
            if self.nodes.delete(member.id).await? {
                report.purged += 1;
            }
        }

        info!(
            user_id = %ctx.user_id,
            node_id = %node_id,
            purged = report.purged,
            released = report.released,
            orphaned = report.orphaned,
            detached = report.detached,
            "Permanently deleted"
        );
        Ok(report)
    }

    /// Clear the caller's trash.
    pub async fn empty_trash(&self, ctx: &RequestContext) -> AppResult<PurgeReport> {
        let trash = self.nodes.list_trash(ctx.user_id).await?;
        let trashed: std::collections::HashSet<Uuid> = trash.iter().map(|n| n.id).collect();
        let mut total = PurgeReport::default();

        // Only trash roots; their subtrees are purged with them.
        for node in trash
            .iter()
            .filter(|n| n.parent_id.is_none_or(|p| !trashed.contains(&p)))
        {
            match self.purge(ctx, node.id).await {
                Ok(report) => {
                    total.purged += report.purged;
                    total.released += report.released;
                    total.orphaned += report.orphaned;
                    total.detached += report.detached;
                }
                Err(e) if e.is(ErrorKind::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    async fn restore_one(&self, node: &Node, parent_id: Option<Uuid>) -> AppResult<Node> {
        let mut parent_id = parent_id;
        for _ in 0..RESTORE_NAME_ATTEMPTS {
            let name = available_name(
                self.nodes.as_ref(),
                node.owner_id,
                parent_id,
                node.kind(),
                &node.name,
            )
            .await?;

            match self.nodes.mark_restored(node.id, parent_id, &name).await {
                Ok(Some(restored)) => return Ok(restored),
                Ok(None) => {
                    let current = self
                        .nodes
                        .find_by_id(node.id)
                        .await?
                        .ok_or_else(|| AppError::not_found("File not found in trash"))?;
                    if current.is_live() {
                        return Ok(current);
                    }
                    if parent_id.is_none() {
                        break;
                    }
                    // The parent stopped being a live folder meanwhile.
                    parent_id = None;
                }
                Err(e) if e.is(ErrorKind::NameConflict) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::conflict(format!(
            "Node {} was modified concurrently during restore",
            node.id
        )))
    }

    async fn detach_live_children(&self, folder: &Node) -> AppResult<usize> {
        let live = self.nodes.list_children(folder.id, Liveness::Live).await?;
        for child in &live {
            let name = available_name(
                self.nodes.as_ref(),
                child.owner_id,
                None,
                child.kind(),
                &child.name,
            )
            .await?;
            self.nodes
                .set_parent(child.id, child.version, None, &name)
                .await?;
            warn!(
                node_id = %child.id,
                folder_id = %folder.id,
                "Live node found under purged folder; moved to root"
            );
        }
        Ok(live.len())
    }
}

fn was_trashed_with(node: &Node, root_deleted_at: DateTime<Utc>) -> bool {
    node.deleted_at.is_some_and(|at| at >= root_deleted_at)
}
