//! Tree Integrity Engine: structural mutations of the file/folder forest.

pub mod duplicate;
pub mod lifecycle;
pub mod naming;
pub mod service;
pub mod walk;

pub use lifecycle::PurgeReport;
pub use service::TreeService;
