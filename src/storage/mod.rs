//! Storage module for the persistent page queue
//!
//! This module handles all database operations for the harvester:
//! - Schema detection and creation
//! - Transactional mutation with rollback on failure
//! - Lock contention handling between the two worker connections
//! - Typed queue operations (dedup, FIFO selection, completion)

mod schema;
mod sqlite;
mod traits;

pub use schema::{PROBE_SQL, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{is_lock_contention, PageQueue, StorageError, StorageResult};

use crate::config::StoreConfig;
use crate::state::PageStatus;

use std::path::Path;

/// Opens the queue database at `path`, creating the schema if needed
pub fn open_store(path: &Path, options: &StoreConfig) -> StorageResult<SqliteStore> {
    SqliteStore::open(path, options)
}

/// Represents a page row in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Path (or absolute URL) of the page, unique
    pub url: String,
    /// RFC 3339 timestamp of insertion; defines processing order
    pub discovered_at: String,
    pub status: PageStatus,
    /// Description of the page; names its image directory
    pub label: String,
}
