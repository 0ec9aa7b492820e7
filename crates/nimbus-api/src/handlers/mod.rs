//! HTTP request handlers.

pub mod browse;
pub mod download;
pub mod file;
pub mod folder;
pub mod health;
pub mod public;
pub mod share;
pub mod storage;
pub mod upload;
pub mod user;
