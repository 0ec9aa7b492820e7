//! Core traits defined in `nimbus-core` and implemented by other crates.

pub mod storage;

pub use storage::{ByteStream, GrantMethod, ObjectBody, ObjectMeta, ObjectStore, PresignedGrant, PutOptions};
