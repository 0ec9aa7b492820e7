//! In-process object store for tests and ephemeral development.
//!
//! Grants are `memory://` URLs; nothing can be uploaded through them, so
//! tests seed objects with [`ObjectStore::put`] to emulate a finished
//! direct transfer. Copy and delete failures plus artificial latency can be
//! injected to exercise the content manager's failure policies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::{
    GrantMethod, ObjectBody, ObjectMeta, ObjectStore, PresignedGrant, PutOptions,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

/// Object store kept in a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    faults: Arc<Faults>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent copy fail.
    pub fn fail_copies(&self, fail: bool) {
        self.faults.fail_copy.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Delay copy and delete calls by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.write().await = latency;
    }

    /// Whether an object exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// User metadata recorded for `key`.
    pub async fn metadata_of(&self, key: &str) -> Option<BTreeMap<String, String>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.metadata.clone())
    }

    async fn simulate_latency(&self) {
        let latency = *self.faults.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn grant(key: &str, method: GrantMethod, expires_in: Duration) -> AppResult<PresignedGrant> {
        let ttl = chrono::Duration::from_std(expires_in)
            .map_err(|_| AppError::validation("Grant lifetime out of range"))?;
        let expires_at = Utc::now() + ttl;
        let op = match method {
            GrantMethod::Get => "get",
            GrantMethod::Put => "put",
        };
        Ok(PresignedGrant {
            url: format!("memory://{key}?op={op}&expires={}", expires_at.timestamp()),
            method,
            headers: BTreeMap::new(),
            expires_at,
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn get(&self, key: &str) -> AppResult<ObjectBody> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| AppError::not_found(format!("Object not found: {key}")))?;

        let meta = ObjectMeta {
            key: key.to_string(),
            size_bytes: object.data.len() as u64,
            content_type: object.content_type.clone(),
            last_modified: Some(object.last_modified),
        };
        let chunk: Result<Bytes, std::io::Error> = Ok(object.data.clone());
        Ok(ObjectBody {
            meta,
            stream: Box::pin(futures::stream::iter([chunk])),
        })
    }

    async fn put(&self, key: &str, data: Bytes, options: &PutOptions) -> AppResult<()> {
        let object = StoredObject {
            data,
            content_type: options.content_type.clone(),
            metadata: options.metadata.clone(),
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn head(&self, key: &str) -> AppResult<Option<ObjectMeta>> {
        Ok(self.objects.read().await.get(key).map(|o| ObjectMeta {
            key: key.to_string(),
            size_bytes: o.data.len() as u64,
            content_type: o.content_type.clone(),
            last_modified: Some(o.last_modified),
        }))
    }

    async fn copy(&self, from: &str, to: &str, options: &PutOptions) -> AppResult<()> {
        self.simulate_latency().await;
        if self.faults.fail_copy.load(Ordering::SeqCst) {
            return Err(AppError::upstream(format!("Simulated copy failure {from} -> {to}")));
        }

        let mut objects = self.objects.write().await;
        let source = objects
            .get(from)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Object not found: {from}")))?;
        objects.insert(
            to.to_string(),
            StoredObject {
                data: source.data,
                content_type: options.content_type.clone().or(source.content_type),
                metadata: options.metadata.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.simulate_latency().await;
        if self.faults.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::upstream(format!("Simulated delete failure on {key}")));
        }
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        _options: &PutOptions,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        Self::grant(key, GrantMethod::Put, expires_in)
    }

    async fn presign_get(
        &self,
        key: &str,
        _content_disposition: &str,
        expires_in: Duration,
    ) -> AppResult<PresignedGrant> {
        Self::grant(key, GrantMethod::Get, expires_in)
    }
}
