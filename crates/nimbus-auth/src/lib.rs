//! # nimbus-auth
//!
//! Verifies identity tokens issued by the external provider and keeps the
//! user directory in step with the identities it sees.

pub mod directory;
pub mod jwt;

pub use directory::KnownUsers;
pub use jwt::{Claims, JwtDecoder, JwtEncoder};
