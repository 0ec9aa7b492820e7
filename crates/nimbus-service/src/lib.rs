//! # nimbus-service
//!
//! Business logic layer for Nimbus Drive. Each service implements one
//! group of use cases on top of the Entity Store traits and the object
//! store.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references, and the acting principal is
//! passed explicitly to every call.

pub mod content;
pub mod context;
pub mod file;
pub mod share;
pub mod storage;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use content::{ContentManager, ReleaseOutcome};
pub use context::{Principal, RequestContext};
pub use file::{BrowseService, DownloadService, UploadService};
pub use share::{AccessResolver, LinkService, ResolvedAccess, ShareService};
pub use storage::QuotaService;
pub use tree::TreeService;
