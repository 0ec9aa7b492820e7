//! Object store orchestration with bounded calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use nimbus_core::config::StorageConfig;
use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::{ObjectBody, ObjectMeta, ObjectStore, PresignedGrant, PutOptions};
use nimbus_storage::disposition;

use super::key;

/// S3 caps a single user-metadata value; names are truncated to fit.
const MAX_METADATA_NAME_CHARS: usize = 255;

/// Outcome of a best-effort content release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The object is gone.
    Released,
    /// The delete failed or timed out; the object may be orphaned.
    Failed(String),
}

impl ReleaseOutcome {
    /// Whether the object was deleted.
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }
}

/// Metadata stamped on every object Nimbus writes.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    /// Owner of the node.
    pub owner_id: Uuid,
    /// Node the object belongs to.
    pub node_id: Uuid,
    /// Display name at write time.
    pub original_name: String,
}

impl UploadMetadata {
    fn into_options(self, content_type: &str) -> PutOptions {
        let name: String = self.original_name.chars().take(MAX_METADATA_NAME_CHARS).collect();
        let options = if content_type.is_empty() {
            PutOptions::default()
        } else {
            PutOptions::with_content_type(content_type)
        };
        options
            .meta("userid", self.owner_id.to_string())
            .meta("fileid", self.node_id.to_string())
            .meta("originalname", name)
    }
}

/// Mediates between nodes and object store keys.
///
/// Every call that can stall on the store (copy, delete, grant issuance,
/// stat) is bounded by the configured operation timeout.
#[derive(Debug, Clone)]
pub struct ContentManager {
    /// Object store backend.
    store: Arc<dyn ObjectStore>,
    /// Upper bound for one store call.
    timeout: Duration,
    /// Upload grant lifetime.
    upload_ttl: Duration,
    /// Download grant lifetime.
    download_ttl: Duration,
}

impl ContentManager {
    /// Creates a new content manager.
    pub fn new(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            timeout: config.operation_timeout(),
            upload_ttl: config.upload_grant_ttl(),
            download_ttl: config.download_grant_ttl(),
        }
    }

    /// The object store backend name.
    pub fn provider_type(&self) -> &str {
        self.store.provider_type()
    }

    /// How long an upload grant stays valid.
    pub fn upload_grant_ttl(&self) -> Duration {
        self.upload_ttl
    }

    /// Whether the object store answers within the operation timeout.
    pub async fn health_check(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.store.health_check()).await,
            Ok(Ok(true))
        )
    }

    /// Derive the content key for a node from its id and display name.
    pub fn generate_key(&self, owner_id: Uuid, node_id: Uuid, name: &str) -> String {
        key::generate_key(owner_id, node_id, key::extension_of(name).as_deref())
    }

    /// Issue a short-lived write grant for exactly one key.
    pub async fn issue_upload_grant(
        &self,
        key: &str,
        mime_type: &str,
        metadata: UploadMetadata,
    ) -> AppResult<PresignedGrant> {
        let options = metadata.into_options(mime_type);
        self.bounded("presign upload", key, self.store.presign_put(key, &options, self.upload_ttl))
            .await
    }

    /// Issue a read grant that suggests `filename` without touching the object.
    pub async fn issue_download_grant(&self, key: &str, filename: &str) -> AppResult<PresignedGrant> {
        let disposition = disposition::attachment(filename);
        self.bounded(
            "presign download",
            key,
            self.store.presign_get(key, &disposition, self.download_ttl),
        )
        .await
    }

    /// Server-side copy. Returns only once the destination fully exists.
    pub async fn copy_content(
        &self,
        source_key: &str,
        dest_key: &str,
        mime_type: &str,
        metadata: UploadMetadata,
    ) -> AppResult<()> {
        let options = metadata.into_options(mime_type);
        self.bounded("copy", dest_key, self.store.copy(source_key, dest_key, &options))
            .await
            .map_err(|e| {
                AppError::upstream(format!("Failed to copy file in storage: {}", e.message))
            })?;
        debug!(source_key, dest_key, "Copied content");
        Ok(())
    }

    /// Best-effort delete. Never fails; the outcome is logged and returned.
    pub async fn release_content(&self, key: &str) -> ReleaseOutcome {
        match self.bounded("delete", key, self.store.delete(key)).await {
            Ok(()) => {
                debug!(key, "Released content");
                ReleaseOutcome::Released
            }
            Err(e) => {
                warn!(key, error = %e, "Content release failed; object left orphaned");
                ReleaseOutcome::Failed(e.message)
            }
        }
    }

    /// Stat an object.
    pub async fn head(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        self.bounded("stat", key, self.store.head(key)).await
    }

    /// Write bytes received by the proxied upload.
    pub async fn put(
        &self,
        key: &str,
        data: Bytes,
        mime_type: &str,
        metadata: UploadMetadata,
    ) -> AppResult<()> {
        let options = metadata.into_options(mime_type);
        self.store.put(key, data, &options).await
    }

    /// Open an object for streaming through the server.
    pub async fn open(&self, key: &str) -> AppResult<ObjectBody> {
        self.store.get(key).await
    }

    async fn bounded<T, F>(&self, operation: &str, key: &str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::upstream(format!(
                "Object store {operation} timed out after {}s: {key}",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::error::ErrorKind;
    use nimbus_storage::MemoryObjectStore;

    fn manager(store: &MemoryObjectStore) -> ContentManager {
        ContentManager::new(Arc::new(store.clone()), &StorageConfig::default())
    }

    fn metadata(name: &str) -> UploadMetadata {
        UploadMetadata {
            owner_id: Uuid::new_v4(),
            node_id: Uuid::new_v4(),
            original_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_copy_stamps_destination_metadata() {
        let store = MemoryObjectStore::new();
        store
            .put("files/u/a.txt", Bytes::from("abc"), &PutOptions::default())
            .await
            .unwrap();

        let meta = metadata(&"n".repeat(400));
        let node_id = meta.node_id;
        manager(&store)
            .copy_content("files/u/a.txt", "files/u/b.txt", "text/plain", meta)
            .await
            .unwrap();

        let stored = store.metadata_of("files/u/b.txt").await.unwrap();
        assert_eq!(stored["fileid"], node_id.to_string());
        assert_eq!(stored["originalname"].chars().count(), 255);
    }

    #[tokio::test]
    async fn test_copy_failure_is_upstream() {
        let store = MemoryObjectStore::new();
        let err = manager(&store)
            .copy_content("files/u/missing", "files/u/b", "", metadata("b"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::UpstreamFailure));
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_times_out() {
        let store = MemoryObjectStore::new();
        store
            .put("files/u/a", Bytes::from("abc"), &PutOptions::default())
            .await
            .unwrap();
        store.set_latency(Some(Duration::from_secs(120))).await;

        let err = manager(&store)
            .copy_content("files/u/a", "files/u/b", "", metadata("b"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::UpstreamFailure));
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_release_never_fails() {
        let store = MemoryObjectStore::new();
        store
            .put("files/u/a", Bytes::from("abc"), &PutOptions::default())
            .await
            .unwrap();
        let manager = manager(&store);

        store.fail_deletes(true);
        assert!(matches!(
            manager.release_content("files/u/a").await,
            ReleaseOutcome::Failed(_)
        ));
        assert!(store.contains("files/u/a").await);

        store.fail_deletes(false);
        assert!(manager.release_content("files/u/a").await.is_released());
        assert!(!store.contains("files/u/a").await);
    }
}
