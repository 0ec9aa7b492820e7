//! Object store trait for pluggable content backends.
//!
//! The object store holds file bytes addressed by opaque keys. Nimbus never
//! derives keys from display names; see `nimbus_service::content`.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for reading object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Metadata about a stored object.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Content type recorded with the object, if any.
    pub content_type: Option<String>,
    /// Last modified timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// An object opened for reading.
pub struct ObjectBody {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// The object bytes.
    pub stream: ByteStream,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Content type and user metadata attached to a written object.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PutOptions {
    /// MIME type stored with the object.
    pub content_type: Option<String>,
    /// User metadata (`x-amz-meta-*` on S3). Replaces the source metadata on copy.
    pub metadata: BTreeMap<String, String>,
}

impl PutOptions {
    /// Options carrying only a content type.
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// HTTP method a presigned grant is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantMethod {
    /// Read the object.
    Get,
    /// Write the object.
    Put,
}

/// A time-limited credential scoped to one key and one operation kind.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PresignedGrant {
    /// Presigned URL.
    pub url: String,
    /// Method the URL must be used with.
    pub method: GrantMethod,
    /// Headers the client must send with the request.
    pub headers: BTreeMap<String, String>,
    /// When the grant stops working.
    pub expires_at: DateTime<Utc>,
}

/// Trait for object store backends.
///
/// Implementations exist for S3-compatible stores, the local filesystem,
/// and process memory. The trait is defined here in `nimbus-core` and
/// implemented in `nimbus-storage`.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "s3", "local").
    fn provider_type(&self) -> &str;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Open an object for streaming. Missing keys yield `NotFound`.
    async fn get(&self, key: &str) -> AppResult<ObjectBody>;

    /// Write an object in one request.
    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> AppResult<()>;

    /// Fetch object metadata, or `None` when the key does not exist.
    async fn head(&self, key: &str) -> AppResult<Option<ObjectMeta>>;

    /// Server-side copy. Completes fully or fails; never leaves a partial object.
    async fn copy(&self, from: &str, to: &str, options: &PutOptions) -> AppResult<()>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Issue a write grant for exactly one key.
    async fn presign_put(
        &self,
        key: &str,
        options: &PutOptions,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant>;

    /// Issue a read grant for exactly one key, overriding the response
    /// `Content-Disposition` without touching the stored object.
    async fn presign_get(
        &self,
        key: &str,
        content_disposition: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant>;
}
