//! Storage traits and error types
//!
//! This module defines the queue interface the workers program against and
//! the errors a storage backend can raise.

use crate::state::PageStatus;
use crate::storage::PageRecord;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid page status in database: {0}")]
    InvalidStatus(String),
}

impl StorageError {
    /// Returns true if the error was caused by another connection holding the lock
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::Sqlite(err) => is_lock_contention(err),
            Self::InvalidStatus(_) => false,
        }
    }
}

/// Returns true for `SQLITE_BUSY` and `SQLITE_LOCKED` failures
pub fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Queue operations needed by the harvest workers
///
/// The discovery worker only checks and inserts; the retrieval worker only
/// selects and finishes. Rows are never deleted.
pub trait PageQueue {
    /// Returns true if a page with this url was already recorded
    fn page_exists(&self, url: &str) -> StorageResult<bool>;

    /// Records a newly discovered page as `Ready`, stamped with the current time
    ///
    /// Callers check `page_exists` first; inserting a known url is a
    /// constraint violation and is returned as an error.
    fn insert_page(&mut self, url: &str, label: &str) -> StorageResult<()>;

    /// Returns the oldest `Ready` page, if any
    fn next_ready_page(&self) -> StorageResult<Option<PageRecord>>;

    /// Marks a page `Finished`
    ///
    /// Returns false if the page is unknown or already finished.
    fn mark_finished(&mut self, url: &str) -> StorageResult<bool>;

    /// Gets a page by url
    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Counts pages with the given status
    fn count_pages_by_status(&self, status: PageStatus) -> StorageResult<u64>;

    /// Counts all recorded pages
    fn count_total_pages(&self) -> StorageResult<u64>;
}
