//! File-level use cases outside the tree engine: upload, download, browse.

pub mod browse;
pub mod download;
pub mod filter;
pub mod upload;

pub use browse::{BrowseService, Crumb, SharedNode};
pub use download::{DownloadService, DownloadTicket, FileDownload};
pub use filter::{ListQuery, ModifiedFilter};
pub use upload::{
    BeginUploadRequest, CompleteUploadRequest, ProxyUpload, UploadService, UploadTicket,
};
