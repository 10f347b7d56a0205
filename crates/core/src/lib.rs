//! ModQueue core library.
//!
//! This crate provides the components of a pre-publication moderation queue:
//! configuration, the SQLite entry store, the permission oracle, the
//! submission interceptor, approval-time conflict checks with three-way
//! merging, the reviewer action engine and folder snapshots.

pub mod config;
pub mod conflict;
pub mod db;
pub mod document;
pub mod engine;
pub mod errors;
pub mod interceptor;
pub mod models;
pub mod permissions;
pub mod snapshot;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use document::DocumentStore;
pub use engine::{ActionEngine, BatchReport, EntryView};
pub use errors::{CoreError, ModerationError};
pub use interceptor::{Interceptor, Outcome};
pub use permissions::PermissionOracle;
