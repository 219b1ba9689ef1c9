//! Retention enforcement.
//!
//! Keeps at most `K` snapshots per location, dropping the oldest. Runs are
//! serialized so two enforcers never race on the same history. A full pass
//! also drops history left behind by locations that are no longer tracked.

use tokio::sync::Mutex as AsyncMutex;

use crate::error::StoreResult;
use crate::policy::RetentionPolicy;
use crate::report::SnapshotReport;
use crate::{run_blocking, SharedLocationSource, SharedRetentionStore, SharedSnapshotStore};

/// Totals from one `enforce_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub locations_checked: usize,
    pub deleted: usize,
    /// Locations whose enforcement failed and was skipped.
    pub failures: usize,
    /// Snapshots removed because their location is no longer tracked.
    pub orphaned: usize,
}

/// Snapshots beyond the `limit` most recent ones.
///
/// Ordering is by parsed instant, newest first. Timestamps that don't parse
/// count as older than any parseable one and go first.
pub fn select_overflow(mut snapshots: Vec<SnapshotReport>, limit: usize) -> Vec<SnapshotReport> {
    if snapshots.len() <= limit {
        return Vec::new();
    }
    snapshots.sort_by(|a, b| (b.instant(), &b.timestamp).cmp(&(a.instant(), &a.timestamp)));
    snapshots.split_off(limit)
}

pub struct RetentionEnforcer {
    snapshots: SharedSnapshotStore,
    retention: SharedRetentionStore,
    locations: SharedLocationSource,
    lock: AsyncMutex<()>,
}

impl RetentionEnforcer {
    pub fn new(
        snapshots: SharedSnapshotStore,
        retention: SharedRetentionStore,
        locations: SharedLocationSource,
    ) -> Self {
        Self {
            snapshots,
            retention,
            locations,
            lock: AsyncMutex::new(()),
        }
    }

    /// Trim one location's history to its effective limit.
    ///
    /// Returns how many snapshots were deleted.
    pub async fn enforce_location(&self, location_id: &str) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;
        self.trim(location_id).await
    }

    /// Trim every tracked location.
    ///
    /// A failure on one location is logged and counted; the rest still run.
    /// Only failing to read the tracked list is an error.
    pub async fn enforce_all(&self) -> StoreResult<RetentionReport> {
        let _guard = self.lock.lock().await;

        let locations = run_blocking(&self.locations, |s| s.list_tracked()).await?;
        let mut report = RetentionReport::default();

        for location in &locations {
            report.locations_checked += 1;
            match self.trim(&location.id).await {
                Ok(deleted) => report.deleted += deleted,
                Err(e) => {
                    tracing::warn!("Retention for {} failed: {}", location.id, e);
                    report.failures += 1;
                }
            }
        }

        match self.sweep_untracked().await {
            Ok(orphaned) => report.orphaned = orphaned,
            Err(e) => {
                tracing::warn!("Untracked snapshot sweep failed: {}", e);
                report.failures += 1;
            }
        }

        if report.deleted > 0 {
            tracing::info!(
                "Retention removed {} snapshots across {} locations",
                report.deleted,
                report.locations_checked
            );
        }
        Ok(report)
    }

    async fn trim(&self, location_id: &str) -> StoreResult<usize> {
        let id = location_id.to_string();
        let policy = run_blocking(&self.retention, move |s| s.get(&id)).await?;

        let Some(limit) = policy.limit() else {
            return Ok(0);
        };

        let id = location_id.to_string();
        let history = run_blocking(&self.snapshots, move |s| s.query_by_location(&id)).await?;
        let overflow = select_overflow(history, limit);
        if overflow.is_empty() {
            return Ok(0);
        }

        let deleted = run_blocking(&self.snapshots, move |s| s.delete_batch(&overflow)).await?;
        tracing::info!(
            "Trimmed {} snapshots from {} (limit {})",
            deleted,
            location_id,
            limit
        );
        Ok(deleted)
    }

    /// Delete snapshots of locations missing from the tracked list.
    ///
    /// Ids are read before the tracked list, so a location added meanwhile
    /// is already tracked by the time its first snapshot could show up here.
    async fn sweep_untracked(&self) -> StoreResult<usize> {
        let stored = run_blocking(&self.snapshots, |s| s.location_ids()).await?;
        if stored.is_empty() {
            return Ok(0);
        }
        let tracked = run_blocking(&self.locations, |s| s.list_tracked()).await?;

        let mut removed = 0;
        for id in stored {
            if tracked.iter().any(|l| l.id == id) {
                continue;
            }
            let target = id.clone();
            let deleted =
                run_blocking(&self.snapshots, move |s| s.delete_by_location(&target)).await?;
            tracing::info!("Removed {} snapshots of untracked location {}", deleted, id);
            removed += deleted;
        }
        Ok(removed)
    }

    /// Effective policy for a location.
    pub async fn policy_for(&self, location_id: &str) -> StoreResult<RetentionPolicy> {
        let id = location_id.to_string();
        run_blocking(&self.retention, move |s| s.get(&id)).await
    }
}
