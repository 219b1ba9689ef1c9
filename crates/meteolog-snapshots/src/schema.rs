//! SQLite connection setup and schema for the snapshot journal.
//!
//! Every store opens its own connection to the same database file; WAL mode
//! and a busy timeout let the capture and retention paths write side by side.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use meteolog_core::DatabaseError;

use crate::error::{StoreError, StoreResult};

const SCHEMA_VERSION: i32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the journal database at `path`.
pub fn open(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("Failed to create data directory {}: {}", parent.display(), e)
        })?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    tracing::debug!("Opened journal at {} (journal_mode={})", path.display(), mode);

    init_schema(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database with the full schema.
pub fn open_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)", [])?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?
        .unwrap_or(0);

    if version > SCHEMA_VERSION {
        return Err(StoreError::Database(DatabaseError::MigrationFailed(format!(
            "journal schema v{} is newer than supported v{}",
            version, SCHEMA_VERSION
        ))));
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            added_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            location_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            location_name TEXT NOT NULL,
            temperature INTEGER,
            feels_like INTEGER,
            condition TEXT,
            precipitation REAL,
            snow REAL,
            humidity INTEGER,
            wind_direction TEXT,
            wind_speed INTEGER,
            max_gust INTEGER,
            user_note TEXT,
            PRIMARY KEY (location_id, timestamp)
        );

        CREATE TABLE IF NOT EXISTS frequency_policies (
            location_id TEXT PRIMARY KEY,
            policy TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS retention_policies (
            scope TEXT PRIMARY KEY,
            max_snapshots INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_timestamp ON snapshots(timestamp);
        "#,
    )?;

    if version < SCHEMA_VERSION {
        conn.execute("DELETE FROM schema_version", [])?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        tracing::info!("Journal schema upgraded from v{} to v{}", version, SCHEMA_VERSION);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_schema_version_recorded() {
        let conn = open_in_memory().unwrap();
        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_open_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("meteolog.db");

        drop(open(&path).unwrap());
        let conn = open(&path).unwrap();

        let rows: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meteolog.db");

        let conn = open(&path).unwrap();
        conn.execute("UPDATE schema_version SET version = ?1", params![SCHEMA_VERSION + 1])
            .unwrap();
        drop(conn);

        let result = open(&path);
        assert!(matches!(
            result,
            Err(StoreError::Database(DatabaseError::MigrationFailed(_)))
        ));
    }
}
