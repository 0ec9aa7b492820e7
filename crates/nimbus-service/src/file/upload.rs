//! Uploads: presigned begin/complete and the proxied single-shot path.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::PresignedGrant;
use nimbus_database::NodeStore;
use nimbus_entity::node::{NewNode, Node, NodeKind};

use crate::content::{ContentManager, UploadMetadata, key_belongs_to};
use crate::context::RequestContext;
use crate::storage::QuotaService;
use crate::tree::naming::normalize_name;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Request to start a direct-to-store upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginUploadRequest {
    /// Display name.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Declared size in bytes.
    pub size: i64,
    /// Destination folder (None = root).
    pub parent_id: Option<Uuid>,
}

/// What the client needs to PUT the bytes.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    /// The reserved file row.
    pub node_id: Uuid,
    /// Object key the grant is scoped to.
    pub key: String,
    /// Write credential.
    pub upload: PresignedGrant,
}

/// Request to confirm a finished direct upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub node_id: Uuid,
    /// Key from the ticket; the key reserved on the row when absent.
    pub key: Option<String>,
    /// Final size, if the client knows better than the declaration.
    pub size: Option<i64>,
}

/// A file received in full by the server.
#[derive(Debug, Clone)]
pub struct ProxyUpload {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
    pub parent_id: Option<Uuid>,
}

/// Outcome of sweeping an owner's abandoned upload reservations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSweep {
    /// Reservations whose bytes had arrived and were committed.
    pub committed: usize,
    /// Reservations dropped because no object ever arrived.
    pub discarded: usize,
}

/// File upload use cases.
#[derive(Clone)]
pub struct UploadService {
    nodes: Arc<dyn NodeStore>,
    content: Arc<ContentManager>,
    quota: Arc<QuotaService>,
    /// Largest accepted single file.
    max_upload_bytes: i64,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        content: Arc<ContentManager>,
        quota: Arc<QuotaService>,
        max_upload_bytes: i64,
    ) -> Self {
        Self {
            nodes,
            content,
            quota,
            max_upload_bytes,
        }
    }

    /// Checks shared by both upload paths, run after settling the owner's
    /// abandoned reservations: size ceiling, quota, destination folder, and a
    /// free file name.
    async fn admit(
        &self,
        ctx: &RequestContext,
        name: &str,
        size: i64,
        parent_id: Option<Uuid>,
    ) -> AppResult<String> {
        let name = normalize_name(name)?;
        let grant_ttl = chrono::Duration::from_std(self.content.upload_grant_ttl())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.sweep_stale_uploads(ctx.user_id, Utc::now() - grant_ttl).await?;
        if size > self.max_upload_bytes {
            return Err(AppError::validation(format!(
                "File exceeds the maximum upload size of {} bytes",
                self.max_upload_bytes
            )));
        }
        self.quota.ensure_room(ctx.user_id, size).await?;

        if let Some(parent_id) = parent_id {
            self.nodes
                .find_by_id(parent_id)
                .await?
                .filter(|p| p.is_owned_by(ctx.user_id) && p.is_live() && p.is_folder)
                .ok_or_else(|| AppError::not_found("Parent folder not found"))?;
        }

        if self
            .nodes
            .find_sibling_by_name(ctx.user_id, parent_id, NodeKind::File, &name, None)
            .await?
            .is_some()
        {
            return Err(AppError::name_conflict("A file with this name already exists"));
        }
        Ok(name)
    }

    /// Reserve a file row and issue a write grant for its key.
    ///
    /// The row is created with no content reference; it only points at
    /// bytes once [`UploadService::complete_upload`] has seen the object.
    pub async fn begin_upload(
        &self,
        ctx: &RequestContext,
        req: BeginUploadRequest,
    ) -> AppResult<UploadTicket> {
        if req.size <= 0 {
            return Err(AppError::validation("Valid file size is required"));
        }
        let mime_type = req.mime_type.trim();
        if mime_type.is_empty() {
            return Err(AppError::validation("MIME type is required"));
        }
        let name = self.admit(ctx, &req.name, req.size, req.parent_id).await?;

        let node_id = Uuid::new_v4();
        let key = self.content.generate_key(ctx.user_id, node_id, &name);
        let metadata = UploadMetadata {
            owner_id: ctx.user_id,
            node_id,
            original_name: name.clone(),
        };
        let upload = self
            .content
            .issue_upload_grant(&key, mime_type, metadata)
            .await?;

        self.nodes
            .insert(
                &NewNode::file(
                    node_id,
                    ctx.user_id,
                    req.parent_id,
                    name.as_str(),
                    mime_type,
                    req.size,
                )
                .with_upload_key(key.clone()),
            )
            .await?;

        info!(
            user_id = %ctx.user_id,
            node_id = %node_id,
            key = %key,
            size = req.size,
            "Upload started"
        );
        Ok(UploadTicket {
            node_id,
            key,
            upload,
        })
    }

    /// Commit the uploaded object to its row once the store has it.
    ///
    /// Completing an already committed file returns it unchanged.
    pub async fn complete_upload(
        &self,
        ctx: &RequestContext,
        req: CompleteUploadRequest,
    ) -> AppResult<Node> {
        let node = self
            .nodes
            .find_by_id(req.node_id)
            .await?
            .filter(|n| n.is_owned_by(ctx.user_id) && n.is_live() && !n.is_folder)
            .ok_or_else(|| AppError::not_found("File not found"))?;
        if node.has_content() {
            return Ok(node);
        }

        let key = match (req.key, node.upload_key.clone()) {
            (Some(key), Some(reserved)) if key == reserved => key,
            (Some(key), None) if key_belongs_to(&key, ctx.user_id, node.id) => key,
            (Some(_), _) => return Err(AppError::validation("Key does not belong to this file")),
            (None, Some(reserved)) => reserved,
            (None, None) => {
                return Err(AppError::validation("No upload was started for this file"));
            }
        };
        let object = self
            .content
            .head(&key)
            .await?
            .ok_or_else(|| AppError::validation("Upload has not reached storage yet"))?;

        let stored_size = i64::try_from(object.size_bytes).unwrap_or(i64::MAX);
        if let Some(size) = req.size {
            if size != stored_size {
                warn!(node_id = %node.id, declared = size, stored = stored_size, "Upload size mismatch; using stored size");
            }
        }
        if stored_size > node.size {
            self.quota
                .ensure_room(ctx.user_id, stored_size - node.size)
                .await?;
        }

        let committed = self.nodes.commit_content(node.id, &key, stored_size).await?;
        info!(
            user_id = %ctx.user_id,
            node_id = %committed.id,
            size = committed.size,
            "Upload completed"
        );
        Ok(committed)
    }

    /// Settle an owner's reservations made before `cutoff` that never
    /// completed.
    ///
    /// The grant has expired by then, so the object either arrived or never
    /// will. Arrived bytes are committed when they fit the quota; everything
    /// else is dropped so the name and the reserved bytes are freed.
    pub async fn sweep_stale_uploads(
        &self,
        owner_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> AppResult<UploadSweep> {
        let mut sweep = UploadSweep::default();
        for node in self.nodes.list_pending_uploads(owner_id, cutoff).await? {
            let object = match &node.upload_key {
                Some(key) => match self.content.head(key).await {
                    Ok(object) => object,
                    Err(e) => {
                        warn!(node_id = %node.id, error = %e, "Could not stat stale upload; keeping it");
                        continue;
                    }
                },
                None => None,
            };

            if let (Some(key), Some(object)) = (&node.upload_key, object) {
                let stored_size = i64::try_from(object.size_bytes).unwrap_or(i64::MAX);
                let fits = stored_size <= node.size
                    || self
                        .quota
                        .ensure_room(owner_id, stored_size - node.size)
                        .await
                        .is_ok();
                if fits {
                    self.nodes.commit_content(node.id, key, stored_size).await?;
                    sweep.committed += 1;
                    continue;
                }
                self.content.release_content(key).await;
            }

            if self.nodes.discard_pending_upload(node.id).await? {
                sweep.discarded += 1;
            }
        }

        if sweep != UploadSweep::default() {
            info!(
                user_id = %owner_id,
                committed = sweep.committed,
                discarded = sweep.discarded,
                "Swept stale uploads"
            );
        }
        Ok(sweep)
    }

    /// Store bytes received by the server and create the committed row.
    pub async fn proxy_upload(&self, ctx: &RequestContext, upload: ProxyUpload) -> AppResult<Node> {
        let size = i64::try_from(upload.data.len()).unwrap_or(i64::MAX);
        let name = self.admit(ctx, &upload.name, size, upload.parent_id).await?;
        let mime_type = upload
            .mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME)
            .to_string();

        let node_id = Uuid::new_v4();
        let key = self.content.generate_key(ctx.user_id, node_id, &name);
        let metadata = UploadMetadata {
            owner_id: ctx.user_id,
            node_id,
            original_name: name.clone(),
        };
        self.content
            .put(&key, upload.data, &mime_type, metadata)
            .await?;

        let row = NewNode::file(node_id, ctx.user_id, upload.parent_id, name, mime_type, size)
            .with_content_ref(key.clone());
        let node = match self.nodes.insert(&row).await {
            Ok(node) => node,
            Err(e) => {
                self.content.release_content(&key).await;
                return Err(e);
            }
        };

        info!(
            user_id = %ctx.user_id,
            node_id = %node.id,
            size,
            "File uploaded through server"
        );
        Ok(node)
    }
}
