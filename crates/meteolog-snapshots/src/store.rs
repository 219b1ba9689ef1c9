//! Snapshot persistence.
//!
//! Snapshots are keyed by `(location_id, timestamp)`. `append` is an upsert on
//! that key, which is what keeps repeated or concurrent captures of the same
//! hour down to a single record.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::report::SnapshotReport;
use crate::schema;

const SELECT_COLUMNS: &str = "timestamp, location_id, location_name, temperature, feels_like, \
     condition, precipitation, snow, humidity, wind_direction, wind_speed, max_gust, user_note";

/// Storage backend for snapshot reports.
///
/// Implementations don't need to be Sync; callers share them behind a
/// `parking_lot::Mutex`.
pub trait SnapshotStore: Send {
    /// Insert or replace the snapshot for its `(location_id, timestamp)`.
    ///
    /// Weather fields take the incoming values. An existing user note survives
    /// when the incoming report has none.
    fn append(&self, report: &SnapshotReport) -> StoreResult<()>;

    /// All snapshots for a location, newest first.
    fn query_by_location(&self, location_id: &str) -> StoreResult<Vec<SnapshotReport>>;

    /// Every snapshot, grouped by location, newest first within a location.
    fn query_all(&self) -> StoreResult<Vec<SnapshotReport>>;

    /// Delete the given snapshots in one transaction. Returns how many existed.
    fn delete_batch(&self, reports: &[SnapshotReport]) -> StoreResult<usize>;

    /// Delete every snapshot of a location. Returns how many were removed.
    fn delete_by_location(&self, location_id: &str) -> StoreResult<usize>;

    /// Get a single snapshot.
    fn get(&self, location_id: &str, timestamp: &str) -> StoreResult<Option<SnapshotReport>>;

    /// Replace the user note of an existing snapshot.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the snapshot doesn't exist.
    fn update_note(
        &self,
        location_id: &str,
        timestamp: &str,
        note: Option<&str>,
    ) -> StoreResult<SnapshotReport>;

    /// Delete a single snapshot.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the snapshot doesn't exist.
    fn delete(&self, location_id: &str, timestamp: &str) -> StoreResult<()>;

    /// Number of snapshots stored for a location.
    fn count_by_location(&self, location_id: &str) -> StoreResult<usize>;

    /// Distinct location ids that have at least one snapshot.
    fn location_ids(&self) -> StoreResult<Vec<String>>;
}

/// SQLite-backed snapshot store.
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    /// Open the store at `path`, creating the database if needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self { conn: schema::open(path)? })
    }

    /// Create an in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }

    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<SnapshotReport> {
        Ok(SnapshotReport {
            timestamp: row.get(0)?,
            location_id: row.get(1)?,
            location_name: row.get(2)?,
            temperature: row.get(3)?,
            feels_like: row.get(4)?,
            condition: row.get(5)?,
            precipitation: row.get(6)?,
            snow: row.get(7)?,
            humidity: row.get(8)?,
            wind_direction: row.get(9)?,
            wind_speed: row.get(10)?,
            max_gust: row.get(11)?,
            user_note: row.get(12)?,
        })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn append(&self, report: &SnapshotReport) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO snapshots (timestamp, location_id, location_name, temperature, feels_like,
                condition, precipitation, snow, humidity, wind_direction, wind_speed, max_gust, user_note)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT (location_id, timestamp) DO UPDATE SET
                location_name = excluded.location_name,
                temperature = excluded.temperature,
                feels_like = excluded.feels_like,
                condition = excluded.condition,
                precipitation = excluded.precipitation,
                snow = excluded.snow,
                humidity = excluded.humidity,
                wind_direction = excluded.wind_direction,
                wind_speed = excluded.wind_speed,
                max_gust = excluded.max_gust,
                user_note = COALESCE(excluded.user_note, snapshots.user_note)
            "#,
            params![
                report.timestamp,
                report.location_id,
                report.location_name,
                report.temperature,
                report.feels_like,
                report.condition,
                report.precipitation,
                report.snow,
                report.humidity,
                report.wind_direction,
                report.wind_speed,
                report.max_gust,
                report.user_note,
            ],
        )?;

        tracing::debug!("Stored snapshot {} for {}", report.timestamp, report.location_id);
        Ok(())
    }

    fn query_by_location(&self, location_id: &str) -> StoreResult<Vec<SnapshotReport>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE location_id = ?1 ORDER BY timestamp DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![location_id], Self::row_to_report)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_all(&self) -> StoreResult<Vec<SnapshotReport>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots ORDER BY location_id ASC, timestamp DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::row_to_report)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn delete_batch(&self, reports: &[SnapshotReport]) -> StoreResult<usize> {
        if reports.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt =
                tx.prepare("DELETE FROM snapshots WHERE location_id = ?1 AND timestamp = ?2")?;
            for report in reports {
                deleted += stmt.execute(params![report.location_id, report.timestamp])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Deleted {} of {} requested snapshots", deleted, reports.len());
        Ok(deleted)
    }

    fn delete_by_location(&self, location_id: &str) -> StoreResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM snapshots WHERE location_id = ?1", params![location_id])?;
        tracing::debug!("Deleted {} snapshots for {}", deleted, location_id);
        Ok(deleted)
    }

    fn get(&self, location_id: &str, timestamp: &str) -> StoreResult<Option<SnapshotReport>> {
        let report = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM snapshots WHERE location_id = ?1 AND timestamp = ?2",
                    SELECT_COLUMNS
                ),
                params![location_id, timestamp],
                Self::row_to_report,
            )
            .optional()?;
        Ok(report)
    }

    fn update_note(
        &self,
        location_id: &str,
        timestamp: &str,
        note: Option<&str>,
    ) -> StoreResult<SnapshotReport> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let changed = self.conn.execute(
            "UPDATE snapshots SET user_note = ?1 WHERE location_id = ?2 AND timestamp = ?3",
            params![note, location_id, timestamp],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found(format!("{}@{}", location_id, timestamp)));
        }

        self.get(location_id, timestamp)?
            .ok_or_else(|| StoreError::not_found(format!("{}@{}", location_id, timestamp)))
    }

    fn delete(&self, location_id: &str, timestamp: &str) -> StoreResult<()> {
        let deleted = self.conn.execute(
            "DELETE FROM snapshots WHERE location_id = ?1 AND timestamp = ?2",
            params![location_id, timestamp],
        )?;
        if deleted == 0 {
            return Err(StoreError::not_found(format!("{}@{}", location_id, timestamp)));
        }
        Ok(())
    }

    fn count_by_location(&self, location_id: &str) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE location_id = ?1",
            params![location_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn location_ids(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT location_id FROM snapshots ORDER BY location_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
