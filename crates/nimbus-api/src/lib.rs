//! # nimbus-api
//!
//! HTTP surface for Nimbus Drive built on Axum. Handlers stay thin: they
//! extract the caller and the request, call one service method, and wrap
//! the result in the standard `{ "success": true, "data": … }` envelope.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
