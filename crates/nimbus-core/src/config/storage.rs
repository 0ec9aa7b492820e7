//! Object store, quota, and grant configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which object store backend holds file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderKind {
    /// S3-compatible object storage (AWS, MinIO, R2).
    S3,
    /// Local filesystem, for single-node development.
    Local,
    /// Process memory, for tests.
    Memory,
}

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use.
    #[serde(default = "default_provider")]
    pub provider: StorageProviderKind,
    /// Per-owner storage ceiling in bytes (default 15 GiB).
    #[serde(default = "default_quota")]
    pub quota_bytes: i64,
    /// Lifetime of a direct-upload grant in seconds.
    #[serde(default = "default_upload_grant")]
    pub upload_grant_seconds: u64,
    /// Lifetime of a download grant in seconds.
    #[serde(default = "default_download_grant")]
    pub download_grant_seconds: u64,
    /// Upper bound for a single object store call (copy, delete, presign).
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,
    /// S3-compatible storage configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
    /// Local filesystem storage configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            quota_bytes: default_quota(),
            upload_grant_seconds: default_upload_grant(),
            download_grant_seconds: default_download_grant(),
            operation_timeout_seconds: default_operation_timeout(),
            s3: S3StorageConfig::default(),
            local: LocalStorageConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Upload grant lifetime.
    pub fn upload_grant_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_grant_seconds)
    }

    /// Download grant lifetime.
    pub fn download_grant_ttl(&self) -> Duration {
        Duration::from_secs(self.download_grant_seconds)
    }

    /// Timeout applied to every object store call.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO). Empty uses AWS.
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// S3 bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Access key ID. Empty falls back to the default credential chain.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style addressing (required by most MinIO setups).
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: false,
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root path for local object storage.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

fn default_provider() -> StorageProviderKind {
    StorageProviderKind::S3
}

fn default_quota() -> i64 {
    15 * 1024 * 1024 * 1024
}

fn default_upload_grant() -> u64 {
    300
}

fn default_download_grant() -> u64 {
    3600
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_local_root() -> String {
    "./data/objects".to_string()
}
