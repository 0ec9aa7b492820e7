//! Local filesystem object store.
//!
//! Keys map to paths under the configured root. This backend cannot issue
//! presigned grants, so deployments using it rely on the proxied upload and
//! download endpoints.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::{
    ObjectBody, ObjectMeta, ObjectStore, PresignedGrant, PutOptions,
};

/// Object store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Root directory for all stored objects.
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local object store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a key to a path within the root, refusing traversal.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::validation(format!("Invalid object key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::UpstreamFailure,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.is_dir())
    }

    async fn get(&self, key: &str) -> AppResult<ObjectBody> {
        let meta = self
            .head(key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Object not found: {key}")))?;

        let file = fs::File::open(self.resolve(key)?).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::UpstreamFailure,
                format!("Failed to open object: {key}"),
                e,
            )
        })?;

        Ok(ObjectBody {
            meta,
            stream: Box::pin(ReaderStream::new(file)),
        })
    }

    async fn put(&self, key: &str, data: Bytes, _options: &PutOptions) -> AppResult<()> {
        let full_path = self.resolve(key)?;
        self.ensure_parent(&full_path).await?;

        fs::write(&full_path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::UpstreamFailure,
                format!("Failed to write object: {key}"),
                e,
            )
        })?;

        debug!(key, bytes = data.len(), "Wrote object");
        Ok(())
    }

    async fn head(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        let full_path = self.resolve(key)?;
        let meta = match fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::UpstreamFailure,
                    format!("Failed to stat object: {key}"),
                    e,
                ));
            }
        };

        Ok(Some(ObjectMeta {
            key: key.to_string(),
            size_bytes: meta.len(),
            content_type: mime_from_key(key),
            last_modified: meta.modified().ok().map(chrono::DateTime::from),
        }))
    }

    async fn copy(&self, from: &str, to: &str, _options: &PutOptions) -> AppResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        self.ensure_parent(&to_path).await?;

        // Stage next to the destination; a failed copy leaves nothing at `to`.
        let staging = to_path.with_extension("partial");
        fs::copy(&from_path, &staging).await.map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::UpstreamFailure
            };
            AppError::with_source(kind, format!("Failed to copy {from} -> {to}"), e)
        })?;
        fs::rename(&staging, &to_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::UpstreamFailure,
                format!("Failed to finalize copy {from} -> {to}"),
                e,
            )
        })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let full_path = self.resolve(key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::UpstreamFailure,
                format!("Failed to delete object: {key}"),
                e,
            )),
        }
    }

    async fn presign_put(
        &self,
        _key: &str,
        _options: &PutOptions,
        _expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        Err(AppError::not_implemented(
            "Local storage cannot issue upload grants; use the proxied upload",
        ))
    }

    async fn presign_get(
        &self,
        _key: &str,
        _content_disposition: &str,
        _expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        Err(AppError::not_implemented(
            "Local storage cannot issue download grants; use the proxied download",
        ))
    }
}

/// Guess a MIME type from the key's extension.
fn mime_from_key(key: &str) -> Option<String> {
    let (_, ext) = key.rsplit_once('.')?;
    let mime = match ext.to_lowercase().as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return None,
    };
    Some(mime.to_string())
}
