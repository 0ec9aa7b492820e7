//! Storage quota accounting.

pub mod quota;

pub use quota::{QuotaService, StorageSummary, format_bytes};
