//! Database schema for SQLite datasets.
//!
//! Records of every object share one table and are stored as JSON. Binary
//! payloads of content versions are kept apart so record reads never pull
//! file content.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Records: one row per (object, id), fields as a JSON object
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    object TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (object, id)
);

CREATE INDEX IF NOT EXISTS idx_records_object ON records(object);

-- Blobs: payload of each content version
CREATE TABLE IF NOT EXISTS blobs (
    version_id TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    checksum TEXT NOT NULL,
    size INTEGER NOT NULL
);
";

/// Apply pragmas and the schema. Safe to call on an existing database.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
