//! Content Reference Manager: opaque keys, grants, and lockstep copy/release.

pub mod key;
pub mod manager;

pub use key::{extension_of, generate_key, key_belongs_to};
pub use manager::{ContentManager, ReleaseOutcome, UploadMetadata};
