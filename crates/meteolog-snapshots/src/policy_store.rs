//! Per-location capture and retention settings.
//!
//! Reads never fail on a missing key: an unset frequency is `Manual` and an
//! unset retention limit falls back to the global limit, then `Unbounded`.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::StoreResult;
use crate::policy::{FrequencyPolicy, RetentionPolicy};
use crate::schema;

/// Row key of the global retention fallback.
const GLOBAL_SCOPE: &str = "*";

/// Storage for per-location capture cadence.
pub trait FrequencyPolicyStore: Send {
    /// The location's policy, `Manual` when unset.
    fn get(&self, location_id: &str) -> StoreResult<FrequencyPolicy>;

    fn set(&self, location_id: &str, policy: FrequencyPolicy) -> StoreResult<()>;

    /// Forget the location's policy.
    fn clear(&self, location_id: &str) -> StoreResult<()>;
}

/// Storage for retention limits, per location with a global fallback.
pub trait RetentionPolicyStore: Send {
    /// Effective policy: location, then global, then `Unbounded`.
    fn get(&self, location_id: &str) -> StoreResult<RetentionPolicy>;

    fn set(&self, location_id: &str, policy: RetentionPolicy) -> StoreResult<()>;

    /// Forget the location's own policy so the global one applies again.
    fn clear(&self, location_id: &str) -> StoreResult<()>;

    fn get_global(&self) -> StoreResult<RetentionPolicy>;

    fn set_global(&self, policy: RetentionPolicy) -> StoreResult<()>;
}

/// SQLite-backed frequency policy store.
pub struct SqliteFrequencyPolicyStore {
    conn: Connection,
}

impl SqliteFrequencyPolicyStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self { conn: schema::open(path)? })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }
}

impl FrequencyPolicyStore for SqliteFrequencyPolicyStore {
    fn get(&self, location_id: &str) -> StoreResult<FrequencyPolicy> {
        let key: Option<String> = self
            .conn
            .query_row(
                "SELECT policy FROM frequency_policies WHERE location_id = ?1",
                params![location_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(key.map(|k| FrequencyPolicy::from_key(&k)).unwrap_or_default())
    }

    fn set(&self, location_id: &str, policy: FrequencyPolicy) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO frequency_policies (location_id, policy) VALUES (?1, ?2)
             ON CONFLICT (location_id) DO UPDATE SET policy = excluded.policy",
            params![location_id, policy.as_str()],
        )?;
        tracing::debug!("Frequency for {} set to {}", location_id, policy.as_str());
        Ok(())
    }

    fn clear(&self, location_id: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM frequency_policies WHERE location_id = ?1",
            params![location_id],
        )?;
        Ok(())
    }
}

/// SQLite-backed retention policy store.
pub struct SqliteRetentionPolicyStore {
    conn: Connection,
}

impl SqliteRetentionPolicyStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self { conn: schema::open(path)? })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self { conn: schema::open_in_memory()? })
    }

    /// `None` when no row exists for `scope`.
    fn read_scope(&self, scope: &str) -> StoreResult<Option<RetentionPolicy>> {
        let column: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT max_snapshots FROM retention_policies WHERE scope = ?1",
                params![scope],
                |row| row.get(0),
            )
            .optional()?;

        Ok(column.map(RetentionPolicy::from_column))
    }

    fn write_scope(&self, scope: &str, policy: RetentionPolicy) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO retention_policies (scope, max_snapshots) VALUES (?1, ?2)
             ON CONFLICT (scope) DO UPDATE SET max_snapshots = excluded.max_snapshots",
            params![scope, policy.to_column()],
        )?;
        tracing::debug!("Retention for {} set to {:?}", scope, policy);
        Ok(())
    }
}

impl RetentionPolicyStore for SqliteRetentionPolicyStore {
    fn get(&self, location_id: &str) -> StoreResult<RetentionPolicy> {
        if let Some(policy) = self.read_scope(location_id)? {
            return Ok(policy);
        }
        self.get_global()
    }

    fn set(&self, location_id: &str, policy: RetentionPolicy) -> StoreResult<()> {
        self.write_scope(location_id, policy)
    }

    fn clear(&self, location_id: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM retention_policies WHERE scope = ?1",
            params![location_id],
        )?;
        Ok(())
    }

    fn get_global(&self) -> StoreResult<RetentionPolicy> {
        Ok(self.read_scope(GLOBAL_SCOPE)?.unwrap_or_default())
    }

    fn set_global(&self, policy: RetentionPolicy) -> StoreResult<()> {
        self.write_scope(GLOBAL_SCOPE, policy)
    }
}
