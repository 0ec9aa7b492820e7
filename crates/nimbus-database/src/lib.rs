//! # nimbus-database
//!
//! The Entity Store: the query contract the tree, sharing, and content
//! services are written against ([`store`]), its PostgreSQL implementation
//! ([`repositories`]), and an in-memory implementation used by tests and
//! single-node development.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{Liveness, MemoryStore, NodeFilter, NodeStore, ShareStore, UserDirectory};
