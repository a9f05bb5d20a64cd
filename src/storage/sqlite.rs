//! SQLite storage implementation
//!
//! `SqliteStore` exposes the generic primitives the queue is built from
//! (`ensure_schema`, `fetch_one`, `execute`, `close`) and implements
//! [`PageQueue`] on top of them.

use crate::config::StoreConfig;
use crate::state::PageStatus;
use crate::storage::schema::{is_missing_table, PROBE_SQL, SCHEMA_SQL};
use crate::storage::traits::{is_lock_contention, PageQueue, StorageError, StorageResult};
use crate::storage::PageRecord;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const PAGE_COLUMNS: &str = "url, discovered_at, status, label";

/// SQLite storage backend
///
/// Each worker owns one of these; two stores may point at the same file.
pub struct SqliteStore {
    conn: Connection,
    lock_attempts: u32,
    lock_backoff: Duration,
}

impl SqliteStore {
    /// Opens (or creates) the queue database and ensures the schema exists
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `options` - Busy timeout and lock retry settings
    pub fn open(path: &Path, options: &StoreConfig) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout())?;

        // WAL lets the retrieval worker read while discovery writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        Self::with_connection(conn, options)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, &StoreConfig::default())
    }

    fn with_connection(conn: Connection, options: &StoreConfig) -> StorageResult<Self> {
        let store = Self {
            conn,
            lock_attempts: options.lock_attempts.max(1),
            lock_backoff: options.lock_backoff(),
        };
        store.ensure_schema(PROBE_SQL, SCHEMA_SQL)?;
        Ok(store)
    }

    /// Runs `probe`; if it reports a missing table, runs `ddl`
    ///
    /// Returns true if the schema was created by this call. Probe failures
    /// other than a missing table are returned unchanged.
    pub fn ensure_schema(&self, probe: &str, ddl: &str) -> StorageResult<bool> {
        match self.conn.query_row(probe, [], |_| Ok(())).optional() {
            Ok(_) => Ok(false),
            Err(err) if is_missing_table(&err) => {
                tracing::info!("Queue table missing, creating schema");
                self.conn.execute_batch(ddl)?;
                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the first row matched by `query`, mapped through `map`
    pub fn fetch_one<T, F>(&self, query: &str, params: &[&dyn ToSql], map: F) -> StorageResult<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(query, params, map).optional()?)
    }

    /// Runs a mutating statement in its own transaction
    ///
    /// Commits on success. On failure the transaction is rolled back and the
    /// error is returned. A statement that fails because another connection
    /// holds the lock is retried up to the configured attempt count.
    pub fn execute(&mut self, statement: &str, params: &[&dyn ToSql]) -> StorageResult<usize> {
        let mut attempt = 1;
        loop {
            match self.execute_once(statement, params) {
                Err(err) if is_lock_contention(&err) && attempt < self.lock_attempts => {
                    tracing::debug!(attempt, "Queue store is locked, retrying statement");
                    // Blocks the calling thread, like the busy timeout does. Each
                    // worker task owns one connection and the wait is bounded by
                    // lock-attempts; see "Blocking SQLite calls" in DESIGN.md.
                    std::thread::sleep(self.lock_backoff * attempt);
                    attempt += 1;
                }
                result => return result.map_err(StorageError::from),
            }
        }
    }

    fn execute_once(&mut self, statement: &str, params: &[&dyn ToSql]) -> rusqlite::Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match tx.execute(statement, params) {
            Ok(changed) => {
                tx.commit()?;
                Ok(changed)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed after {}: {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Releases the underlying connection
    pub fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, err)| StorageError::from(err))
    }
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let raw_status: String = row.get(2)?;
    let status = PageStatus::from_db_string(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            Box::new(StorageError::InvalidStatus(raw_status.clone())),
        )
    })?;

    Ok(PageRecord {
        url: row.get(0)?,
        discovered_at: row.get(1)?,
        status,
        label: row.get(3)?,
    })
}

impl PageQueue for SqliteStore {
    fn page_exists(&self, url: &str) -> StorageResult<bool> {
        let found = self.fetch_one("SELECT 1 FROM pages WHERE url = ?1", params![url], |_| Ok(()))?;
        Ok(found.is_some())
    }

    fn insert_page(&mut self, url: &str, label: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.execute(
            "INSERT INTO pages (url, discovered_at, status, label) VALUES (?1, ?2, ?3, ?4)",
            params![url, now, PageStatus::Ready.to_db_string(), label],
        )?;
        Ok(())
    }

    fn next_ready_page(&self) -> StorageResult<Option<PageRecord>> {
        let query = format!(
            "SELECT {} FROM pages WHERE status = ?1 ORDER BY discovered_at ASC, rowid ASC LIMIT 1",
            PAGE_COLUMNS
        );
        self.fetch_one(&query, params![PageStatus::Ready.to_db_string()], row_to_page)
    }

    fn mark_finished(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self.execute(
            "UPDATE pages SET status = ?1 WHERE url = ?2 AND status = ?3",
            params![
                PageStatus::Finished.to_db_string(),
                url,
                PageStatus::Ready.to_db_string()
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_page(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let query = format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS);
        self.fetch_one(&query, params![url], row_to_page)
    }

    fn count_pages_by_status(&self, status: PageStatus) -> StorageResult<u64> {
        let count: Option<i64> = self.fetch_one(
            "SELECT COUNT(*) FROM pages WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count.unwrap_or(0) as u64)
    }

    fn count_total_pages(&self) -> StorageResult<u64> {
        let count: Option<i64> = self.fetch_one("SELECT COUNT(*) FROM pages", &[], |row| row.get(0))?;
        Ok(count.unwrap_or(0) as u64)
    }
}
