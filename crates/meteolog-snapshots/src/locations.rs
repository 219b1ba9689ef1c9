//! Tracked locations.

use chrono::Utc;
use meteolog_weather::Location;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::schema;

/// Source of the locations the capture cycle walks over.
///
/// Read fresh on every cycle; implementations must not hand out a cached copy.
pub trait LocationSource: Send {
    fn list_tracked(&self) -> StoreResult<Vec<Location>>;

    fn is_tracked(&self, location_id: &str) -> StoreResult<bool> {
        Ok(self.list_tracked()?.iter().any(|l| l.id == location_id))
    }
}

/// Editable location list.
pub trait LocationStore: LocationSource {
    /// Track a location, or rename it if already tracked.
    fn add(&self, location: &Location) -> StoreResult<()>;

    /// Stop tracking a location.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the location isn't tracked.
    fn remove(&self, location_id: &str) -> StoreResult<()>;

    fn get(&self, location_id: &str) -> StoreResult<Option<Location>>;
}

/// SQLite-backed list of tracked locations.
pub struct SqliteLocationStore {
    conn: Connection,
}

impl SqliteLocationStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self { conn: schema::open(path)? })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }
}

impl LocationStore for SqliteLocationStore {
    fn add(&self, location: &Location) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO locations (id, display_name, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET display_name = excluded.display_name",
            params![location.id, location.display_name, Utc::now().to_rfc3339()],
        )?;
        tracing::info!("Tracking location {} ({})", location.id, location.display_name);
        Ok(())
    }

    fn remove(&self, location_id: &str) -> StoreResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM locations WHERE id = ?1", params![location_id])?;
        if removed == 0 {
            return Err(StoreError::not_found(location_id));
        }
        tracing::info!("Stopped tracking location {}", location_id);
        Ok(())
    }

    fn get(&self, location_id: &str) -> StoreResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                "SELECT id, display_name FROM locations WHERE id = ?1",
                params![location_id],
                |row| Ok(Location::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(location)
    }
}

impl LocationSource for SqliteLocationStore {
    fn list_tracked(&self) -> StoreResult<Vec<Location>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, display_name FROM locations ORDER BY added_at ASC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Location::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn is_tracked(&self, location_id: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM locations WHERE id = ?1",
                params![location_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
