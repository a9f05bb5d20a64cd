//! Database schema definitions
//!
//! The queue is a single `pages` table. Its presence is detected with a cheap
//! probe query; there is no migration path for column changes.

/// Probe that fails with "no such table" until the schema exists
pub const PROBE_SQL: &str = "SELECT 1 FROM pages ORDER BY rowid ASC LIMIT 1";

/// SQL schema for the queue database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE pages (
    url TEXT PRIMARY KEY,
    discovered_at TEXT NOT NULL,
    status TEXT NOT NULL,
    label TEXT NOT NULL
);

CREATE INDEX idx_pages_status_discovered ON pages(status, discovered_at);
"#;

/// Returns true if the error reports a missing table
pub fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.starts_with("no such table"),
        _ => false,
    }
}
