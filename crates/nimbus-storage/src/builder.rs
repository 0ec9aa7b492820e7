//! Object store construction from configuration.

use std::sync::Arc;

use tracing::info;

use nimbus_core::config::{StorageConfig, StorageProviderKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::storage::ObjectStore;

use crate::providers::{LocalObjectStore, MemoryObjectStore};

/// Build the configured object store backend.
pub async fn build_object_store(config: &StorageConfig) -> AppResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.provider {
        #[cfg(feature = "s3")]
        StorageProviderKind::S3 => Arc::new(crate::providers::S3ObjectStore::new(&config.s3).await?),
        #[cfg(not(feature = "s3"))]
        StorageProviderKind::S3 => {
            return Err(nimbus_core::AppError::configuration(
                "S3 support is not compiled in (enable the `s3` feature)",
            ));
        }
        StorageProviderKind::Local => Arc::new(LocalObjectStore::new(&config.local.root_path).await?),
        StorageProviderKind::Memory => Arc::new(MemoryObjectStore::new()),
    };

    info!(provider = store.provider_type(), "Object store ready");
    Ok(store)
}
