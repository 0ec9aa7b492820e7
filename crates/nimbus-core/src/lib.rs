//! # nimbus-core
//!
//! Core crate for Nimbus Drive. Contains the unified error system,
//! configuration schemas, and the object store trait implemented by
//! `nimbus-storage`.
//!
//! This crate has **no** internal dependencies on other Nimbus crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
