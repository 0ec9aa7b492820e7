//! Convenience result type alias for Nimbus.

use crate::error::AppError;

/// A specialized `Result` type for Nimbus operations.
pub type AppResult<T> = Result<T, AppError>;
