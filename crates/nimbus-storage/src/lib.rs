//! # nimbus-storage
//!
//! Object store backends for file content: S3-compatible stores (with
//! presigned grants), the local filesystem, and process memory.

pub mod builder;
pub mod disposition;
pub mod providers;

pub use builder::build_object_store;
pub use providers::{LocalObjectStore, MemoryObjectStore};

#[cfg(feature = "s3")]
pub use providers::S3ObjectStore;
