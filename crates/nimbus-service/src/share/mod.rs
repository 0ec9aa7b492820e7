//! Sharing: link shares, named grants, and access resolution.

pub mod access;
pub mod link;
pub mod service;

pub use access::{AccessResolver, ResolvedAccess};
pub use link::LinkService;
pub use service::{
    GrantOutcome, GrantStatus, LinkShareView, PersonRole, PublicNode, ShareInfo, SharePerson,
    ShareService,
};
