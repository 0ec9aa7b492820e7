//! Share domain entities.

pub mod access;
pub mod model;

pub use access::{AccessLevel, SharePermission};
pub use model::{GrantTarget, NewShare, Share};
