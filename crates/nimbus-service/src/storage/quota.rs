//! Per-owner storage ceiling, checked before any write that adds bytes.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_database::NodeStore;
use nimbus_entity::storage::StorageUsage;

/// Checks and reports live-file usage against a fixed ceiling.
#[derive(Clone)]
pub struct QuotaService {
    /// Node store (usage aggregate).
    nodes: Arc<dyn NodeStore>,
    /// Ceiling in bytes.
    limit_bytes: i64,
}

impl std::fmt::Debug for QuotaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaService")
            .field("limit_bytes", &self.limit_bytes)
            .finish()
    }
}

/// Usage with human-readable sizes, as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct StorageSummary {
    /// Raw figures.
    #[serde(flatten)]
    pub usage: StorageUsage,
    /// `used_bytes` formatted.
    pub used_formatted: String,
    /// `limit_bytes` formatted.
    pub limit_formatted: String,
    /// `remaining_bytes` formatted.
    pub remaining_formatted: String,
}

impl QuotaService {
    /// Creates a new quota service.
    pub fn new(nodes: Arc<dyn NodeStore>, limit_bytes: i64) -> Self {
        Self { nodes, limit_bytes }
    }

    /// Current usage of an owner.
    pub async fn usage(&self, owner_id: Uuid) -> AppResult<StorageUsage> {
        let (used, count) = self.nodes.usage(owner_id).await?;
        Ok(StorageUsage::new(self.limit_bytes, used, count))
    }

    /// Usage with formatted sizes.
    pub async fn summary(&self, owner_id: Uuid) -> AppResult<StorageSummary> {
        let usage = self.usage(owner_id).await?;
        Ok(StorageSummary {
            used_formatted: format_bytes(usage.used_bytes),
            limit_formatted: format_bytes(usage.limit_bytes),
            remaining_formatted: format_bytes(usage.remaining_bytes),
            usage,
        })
    }

    /// Fail with `QuotaExceeded` unless `additional_bytes` still fit.
    pub async fn ensure_room(&self, owner_id: Uuid, additional_bytes: i64) -> AppResult<()> {
        let usage = self.usage(owner_id).await?;
        if usage.would_exceed(additional_bytes) {
            info!(
                owner_id = %owner_id,
                used = usage.used_bytes,
                requested = additional_bytes,
                "Storage quota exceeded"
            );
            return Err(AppError::quota_exceeded(format!(
                "Storage limit exceeded. You have {} GB remaining.",
                usage.remaining_gib()
            )));
        }
        Ok(())
    }
}

/// Format a byte count with binary units and two decimals (`1.50 GB`).
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes <= 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
