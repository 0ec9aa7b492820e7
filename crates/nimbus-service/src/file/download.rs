//! Downloads for owners and grantees: presigned grants and proxied streams.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::{ObjectBody, PresignedGrant};
use nimbus_database::NodeStore;
use nimbus_entity::node::Node;
use nimbus_entity::share::SharePermission;

use crate::content::ContentManager;
use crate::context::Principal;
use crate::share::AccessResolver;

/// A file's row together with its open byte stream.
pub struct FileDownload {
    pub node: Node,
    pub body: ObjectBody,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("node_id", &self.node.id)
            .field("size", &self.node.size)
            .finish()
    }
}

/// A read grant plus what the client needs to label the file.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadTicket {
    pub node_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub download: PresignedGrant,
}

/// File download use cases.
#[derive(Clone)]
pub struct DownloadService {
    nodes: Arc<dyn NodeStore>,
    content: Arc<ContentManager>,
    access: Arc<AccessResolver>,
}

impl std::fmt::Debug for DownloadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadService").finish()
    }
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        content: Arc<ContentManager>,
        access: Arc<AccessResolver>,
    ) -> Self {
        Self {
            nodes,
            content,
            access,
        }
    }

    /// A committed, readable file and its content key.
    async fn readable_file(&self, principal: &Principal, node_id: Uuid) -> AppResult<(Node, String)> {
        let (node, _) = self
            .access
            .require(node_id, principal, SharePermission::Viewer)
            .await?;
        if node.is_trashed() {
            return Err(AppError::not_found("File not found"));
        }
        if node.is_folder {
            return Err(AppError::invalid_operation("Folders cannot be downloaded"));
        }
        let key = node
            .content_ref
            .clone()
            .ok_or_else(|| AppError::not_found("File content not found"))?;
        Ok((node, key))
    }

    async fn touch(&self, node_id: Uuid) {
        if let Err(e) = self.nodes.touch_accessed(node_id, Utc::now()).await {
            debug!(node_id = %node_id, error = %e, "Failed to record access");
        }
    }

    /// Issue a time-limited read grant naming the file for the browser.
    pub async fn download_grant(
        &self,
        principal: &Principal,
        node_id: Uuid,
    ) -> AppResult<DownloadTicket> {
        let (node, key) = self.readable_file(principal, node_id).await?;
        let download = self.content.issue_download_grant(&key, &node.name).await?;
        self.touch(node.id).await;

        info!(node_id = %node.id, principal = ?principal.user_id(), "Download grant issued");
        Ok(DownloadTicket {
            node_id: node.id,
            name: node.name,
            mime_type: node.mime_type,
            size: node.size,
            download,
        })
    }

    /// Open the file's bytes for streaming through the server.
    pub async fn download(&self, principal: &Principal, node_id: Uuid) -> AppResult<FileDownload> {
        let (node, key) = self.readable_file(principal, node_id).await?;
        let body = self.content.open(&key).await?;
        self.touch(node.id).await;

        info!(node_id = %node.id, principal = ?principal.user_id(), "File downloaded");
        Ok(FileDownload { node, body })
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::test_support::Fixture;
    use nimbus_core::error::ErrorKind;
    use nimbus_database::ShareStore;
    use nimbus_entity::share::{GrantTarget, NewShare};

    fn service(fx: &Fixture) -> DownloadService {
        let store = Arc::new(fx.store.clone());
        DownloadService::new(
            store.clone(),
            fx.content.clone(),
            Arc::new(AccessResolver::new(store.clone(), store)),
        )
    }

    #[tokio::test]
    async fn test_owner_downloads_and_access_is_stamped() {
        let fx = Fixture::new();
        let downloads = service(&fx);
        let f = fx.file(None, "a \"b\".txt", 2).await;

        let ticket = downloads.download_grant(&fx.ctx.principal(), f.id).await.unwrap();
        assert_eq!(ticket.name, "a \"b\".txt");
        assert!(fx.node(f.id).await.last_accessed_at.is_some());

        let download = downloads.download(&fx.ctx.principal(), f.id).await.unwrap();
        let bytes: Vec<_> = download.body.stream.try_collect().await.unwrap();
        assert_eq!(bytes.concat(), b"xx".to_vec());
    }

    #[tokio::test]
    async fn test_grantee_inside_shared_folder_can_download() {
        let fx = Fixture::new();
        let downloads = service(&fx);
        let folder = fx.tree.create_folder(&fx.ctx, None, "Shared").await.unwrap();
        let f = fx.file(Some(folder.id), "f.txt", 1).await;
        let guest = Uuid::new_v4();
        let principal = Principal::User {
            user_id: guest,
            email: "guest@example.com".to_string(),
        };

        let err = downloads.download_grant(&principal, f.id).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));

        ShareStore::insert(
            &fx.store,
            &NewShare::named(folder.id, fx.ctx.user_id, GrantTarget::User(guest), SharePermission::Viewer),
        )
        .await
        .unwrap();
        downloads.download_grant(&principal, f.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_folders_and_uncommitted_files_are_rejected() {
        let fx = Fixture::new();
        let downloads = service(&fx);
        let folder = fx.tree.create_folder(&fx.ctx, None, "Dir").await.unwrap();
        let pending = NodeStore::insert(
            &fx.store,
            &nimbus_entity::node::NewNode::file(Uuid::new_v4(), fx.ctx.user_id, None, "p.bin", "x/y", 9),
        )
        .await
        .unwrap();

        let err = downloads.download_grant(&fx.ctx.principal(), folder.id).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidOperation));
        let err = downloads.download(&fx.ctx.principal(), pending.id).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_trashed_file_is_not_downloadable() {
        let fx = Fixture::new();
        let downloads = service(&fx);
        let f = fx.file(None, "f.txt", 1).await;
        fx.tree.soft_delete(&fx.ctx, f.id).await.unwrap();

        let err = downloads.download(&fx.ctx.principal(), f.id).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }
}
