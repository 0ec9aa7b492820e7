//! Recursive duplicate into the source's own parent.

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::Liveness;
use nimbus_entity::node::{NewNode, Node, NodeKind};

use super::naming::available_name;
use super::service::TreeService;
use super::walk::collect_subtree;
use crate::content::UploadMetadata;
use crate::context::RequestContext;

impl TreeService {
    /// Copy a live node (and its live subtree) next to itself.
    ///
    /// Names follow `Base (n)Ext`, resolved independently in every
    /// destination folder. Each file's bytes are copied before its row is
    /// written, so a failed copy never leaves a row without content. Files
    /// whose upload never completed are skipped inside folders.
    pub async fn duplicate(&self, ctx: &RequestContext, node_id: Uuid) -> AppResult<Node> {
        let source = self.owned_live_node(ctx, node_id).await?;
        if !source.is_folder && source.content_ref.is_none() {
            return Err(AppError::invalid_operation(
                "Cannot duplicate a file whose upload has not completed",
            ));
        }

        let subtree = collect_subtree(self.nodes.as_ref(), source.clone(), Liveness::Live).await?;
        let bytes: i64 = subtree
            .iter()
            .filter(|n| n.has_content())
            .map(|n| n.size)
            .sum();
        if bytes > 0 {
            self.quota.ensure_room(ctx.user_id, bytes).await?;
        }

        // Pre-order guarantees every parent is copied before its children.
        let mut copies: HashMap<Uuid, Uuid> = HashMap::with_capacity(subtree.len());
        let mut root_copy = None;
        for member in &subtree {
            let dest_parent = if member.id == source.id {
                source.parent_id
            } else {
                let parent = member.parent_id.and_then(|p| copies.get(&p).copied());
                if parent.is_none() {
                    return Err(AppError::internal(format!(
                        "Duplicate lost track of the parent of {}",
                        member.id
                    )));
                }
                parent
            };

            let copy = if member.is_folder {
                self.copy_folder(member, dest_parent).await?
            } else if member.has_content() {
                self.copy_file(member, dest_parent).await?
            } else {
                debug!(node_id = %member.id, "Skipping uncommitted file");
                continue;
            };

            copies.insert(member.id, copy.id);
            if member.id == source.id {
                root_copy = Some(copy);
            }
        }

        let copy = root_copy.ok_or_else(|| AppError::internal("Duplicate produced no copy"))?;
        info!(
            user_id = %ctx.user_id,
            source_id = %source.id,
            copy_id = %copy.id,
            name = %copy.name,
            nodes = copies.len(),
            bytes,
            "Duplicated"
        );
        Ok(copy)
    }

    async fn copy_folder(&self, folder: &Node, dest_parent: Option<Uuid>) -> AppResult<Node> {
        let name = available_name(
            self.nodes.as_ref(),
            folder.owner_id,
            dest_parent,
            NodeKind::Folder,
            &folder.name,
        )
        .await?;
        self.nodes
            .insert(&NewNode::folder(folder.owner_id, dest_parent, name))
            .await
    }

    async fn copy_file(&self, file: &Node, dest_parent: Option<Uuid>) -> AppResult<Node> {
        let source_key = file
            .content_ref
            .as_deref()
            .ok_or_else(|| AppError::invalid_operation("File has no content"))?;
        let name = available_name(
            self.nodes.as_ref(),
            file.owner_id,
            dest_parent,
            NodeKind::File,
            &file.name,
        )
        .await?;

        let id = Uuid::new_v4();
        let key = self.content.generate_key(file.owner_id, id, &file.name);
        let metadata = UploadMetadata {
            owner_id: file.owner_id,
            node_id: id,
            original_name: name.clone(),
        };
        self.content
            .copy_content(source_key, &key, &file.mime_type, metadata)
            .await?;

        let row = NewNode::file(id, file.owner_id, dest_parent, name, file.mime_type.clone(), file.size)
            .with_content_ref(key.clone());
        match self.nodes.insert(&row).await {
            Ok(node) => Ok(node),
            Err(e) => {
                // The row lost a race; drop the object it would have owned.
                self.content.release_content(&key).await;
                Err(e)
            }
        }
    }
}
