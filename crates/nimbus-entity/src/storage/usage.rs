//! Storage usage value object.

use serde::{Deserialize, Serialize};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// An owner's live-file byte usage against a fixed ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUsage {
    /// Bytes used by live files.
    pub used_bytes: i64,
    /// Ceiling in bytes.
    pub limit_bytes: i64,
    /// Bytes still available (never negative).
    pub remaining_bytes: i64,
    /// Usage percentage (0.0 - 100.0, two decimals).
    pub percentage: f64,
    /// Number of live files.
    pub file_count: i64,
}

impl StorageUsage {
    /// Create a usage snapshot from the ceiling and the current sum.
    pub fn new(limit_bytes: i64, used_bytes: i64, file_count: i64) -> Self {
        let remaining_bytes = (limit_bytes - used_bytes).max(0);
        let percentage = if limit_bytes <= 0 {
            100.0
        } else {
            let raw = (used_bytes as f64 / limit_bytes as f64) * 100.0;
            ((raw * 100.0).round() / 100.0).min(100.0)
        };

        Self {
            used_bytes,
            limit_bytes,
            remaining_bytes,
            percentage,
            file_count,
        }
    }

    /// Check if adding the given number of bytes would exceed the ceiling.
    pub fn would_exceed(&self, additional_bytes: i64) -> bool {
        self.used_bytes.saturating_add(additional_bytes) > self.limit_bytes
    }

    /// Remaining space in GiB, formatted with two decimals.
    pub fn remaining_gib(&self) -> String {
        format!("{:.2}", self.remaining_bytes as f64 / GIB)
    }
}
