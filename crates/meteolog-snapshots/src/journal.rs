//! Journal facade.
//!
//! Everything a presentation layer needs to browse and edit the snapshot
//! history. Results come back as [`LoadState`] so callers render success and
//! failure the same way.

use meteolog_weather::Location;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::policy::{FrequencyPolicy, RetentionPolicy};
use crate::report::SnapshotReport;
use crate::retention::{RetentionEnforcer, RetentionReport};
use crate::state::LoadState;
use crate::{
    run_blocking, SharedFrequencyStore, SharedLocationStore, SharedRetentionStore,
    SharedSnapshotStore,
};

pub struct Journal {
    locations: SharedLocationStore,
    snapshots: SharedSnapshotStore,
    frequencies: SharedFrequencyStore,
    retention: SharedRetentionStore,
    enforcer: Arc<RetentionEnforcer>,
}

impl Journal {
    pub fn new(
        locations: SharedLocationStore,
        snapshots: SharedSnapshotStore,
        frequencies: SharedFrequencyStore,
        retention: SharedRetentionStore,
        enforcer: Arc<RetentionEnforcer>,
    ) -> Self {
        Self {
            locations,
            snapshots,
            frequencies,
            retention,
            enforcer,
        }
    }

    pub async fn tracked_locations(&self) -> LoadState<Vec<Location>> {
        into_state(run_blocking(&self.locations, |s| s.list_tracked()).await)
    }

    /// Start tracking a location with the given capture cadence.
    pub async fn add_location(
        &self,
        location: Location,
        frequency: FrequencyPolicy,
    ) -> LoadState<Location> {
        let id = location.id.clone();
        let result = async {
            let stored = location.clone();
            run_blocking(&self.locations, move |s| s.add(&stored)).await?;
            run_blocking(&self.frequencies, move |s| s.set(&id, frequency)).await?;
            Ok::<_, StoreError>(location)
        }
        .await;
        into_state(result)
    }

    /// Stop tracking a location and drop its history and policies.
    ///
    /// Returns how many snapshots were deleted.
    pub async fn remove_location(&self, location_id: &str) -> LoadState<usize> {
        let result = async {
            let id = location_id.to_string();
            run_blocking(&self.locations, move |s| s.remove(&id)).await?;

            let id = location_id.to_string();
            let deleted = run_blocking(&self.snapshots, move |s| s.delete_by_location(&id)).await?;

            let id = location_id.to_string();
            run_blocking(&self.frequencies, move |s| s.clear(&id)).await?;

            let id = location_id.to_string();
            run_blocking(&self.retention, move |s| s.clear(&id)).await?;

            tracing::info!("Removed {} with {} snapshots", location_id, deleted);
            Ok::<_, StoreError>(deleted)
        }
        .await;
        into_state(result)
    }

    /// History of one location, newest first.
    pub async fn history(&self, location_id: &str) -> LoadState<Vec<SnapshotReport>> {
        let id = location_id.to_string();
        into_state(run_blocking(&self.snapshots, move |s| s.query_by_location(&id)).await)
    }

    pub async fn all_history(&self) -> LoadState<Vec<SnapshotReport>> {
        into_state(run_blocking(&self.snapshots, |s| s.query_all()).await)
    }

    /// Set or clear the note on a snapshot. A blank note clears it.
    pub async fn edit_note(
        &self,
        location_id: &str,
        timestamp: &str,
        note: Option<String>,
    ) -> LoadState<SnapshotReport> {
        let id = location_id.to_string();
        let ts = timestamp.to_string();
        into_state(
            run_blocking(&self.snapshots, move |s| s.update_note(&id, &ts, note.as_deref())).await,
        )
    }

    pub async fn delete_snapshot(&self, location_id: &str, timestamp: &str) -> LoadState<()> {
        let id = location_id.to_string();
        let ts = timestamp.to_string();
        into_state(run_blocking(&self.snapshots, move |s| s.delete(&id, &ts)).await)
    }

    pub async fn frequency(&self, location_id: &str) -> LoadState<FrequencyPolicy> {
        let id = location_id.to_string();
        into_state(run_blocking(&self.frequencies, move |s| s.get(&id)).await)
    }

    pub async fn set_frequency(
        &self,
        location_id: &str,
        policy: FrequencyPolicy,
    ) -> LoadState<FrequencyPolicy> {
        let id = location_id.to_string();
        let result = run_blocking(&self.frequencies, move |s| s.set(&id, policy)).await;
        into_state(result.map(|_| policy))
    }

    /// Effective retention for a location, after the global fallback.
    pub async fn retention(&self, location_id: &str) -> LoadState<RetentionPolicy> {
        into_state(self.enforcer.policy_for(location_id).await)
    }

    /// Change a location's retention limit and trim its history right away.
    ///
    /// Returns how many snapshots the new limit removed.
    pub async fn set_retention(&self, location_id: &str, policy: RetentionPolicy) -> LoadState<usize> {
        let result = async {
            let id = location_id.to_string();
            run_blocking(&self.retention, move |s| s.set(&id, policy)).await?;
            self.enforcer.enforce_location(location_id).await
        }
        .await;
        into_state(result)
    }

    /// Change the global fallback limit and trim every location.
    pub async fn set_global_retention(&self, policy: RetentionPolicy) -> LoadState<RetentionReport> {
        let result = async {
            run_blocking(&self.retention, move |s| s.set_global(policy)).await?;
            self.enforcer.enforce_all().await
        }
        .await;
        into_state(result)
    }
}

fn into_state<T>(result: StoreResult<T>) -> LoadState<T> {
    if let Err(e) = &result {
        match e {
            StoreError::NotFound(_) => tracing::debug!("Journal lookup missed: {}", e),
            _ => tracing::warn!("Journal operation failed: {}", e),
        }
    }
    LoadState::from_result(result)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::locations::SqliteLocationStore;
    use crate::policy_store::{SqliteFrequencyPolicyStore, SqliteRetentionPolicyStore};
    use crate::store::{SnapshotStore, SqliteSnapshotStore};
    use parking_lot::Mutex;

    struct Fixture {
        snapshots: Arc<Mutex<SqliteSnapshotStore>>,
        journal: Journal,
    }

    fn fixture() -> Fixture {
        let locations = Arc::new(Mutex::new(SqliteLocationStore::in_memory().unwrap()));
        let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::in_memory().unwrap()));
        let frequencies = Arc::new(Mutex::new(SqliteFrequencyPolicyStore::in_memory().unwrap()));
        let retention = Arc::new(Mutex::new(SqliteRetentionPolicyStore::in_memory().unwrap()));
        let enforcer = Arc::new(RetentionEnforcer::new(
            snapshots.clone(),
            retention.clone(),
            locations.clone(),
        ));
        let journal = Journal::new(locations, snapshots.clone(), frequencies, retention, enforcer);
        Fixture { snapshots, journal }
    }

    fn seed(fixture: &Fixture, location_id: &str, hours: u32) {
        for h in 0..hours {
            fixture
                .snapshots
                .lock()
                .append(&SnapshotReport::new(
                    format!("2025-05-11T{:02}:00", h),
                    location_id,
                    "Madrid",
                ))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_add_location_sets_frequency() {
        let f = fixture();
        let added = f
            .journal
            .add_location(Location::new("28079", "Madrid"), FrequencyPolicy::Every2h)
            .await;
        assert!(added.is_success());

        assert_eq!(
            f.journal.tracked_locations().await,
            LoadState::Success(vec![Location::new("28079", "Madrid")])
        );
        assert_eq!(
            f.journal.frequency("28079").await,
            LoadState::Success(FrequencyPolicy::Every2h)
        );
    }

    #[tokio::test]
    async fn test_remove_location_cascades() {
        let f = fixture();
        f.journal
            .add_location(Location::new("28079", "Madrid"), FrequencyPolicy::Hourly)
            .await;
        f.journal
            .set_retention("28079", RetentionPolicy::MaxSnapshots(15))
            .await;
        seed(&f, "28079", 5);

        assert_eq!(f.journal.remove_location("28079").await, LoadState::Success(5));

        assert_eq!(f.journal.history("28079").await, LoadState::Success(vec![]));
        assert_eq!(
            f.journal.frequency("28079").await,
            LoadState::Success(FrequencyPolicy::Manual)
        );
        assert_eq!(
            f.journal.retention("28079").await,
            LoadState::Success(RetentionPolicy::Unbounded)
        );
    }

    #[tokio::test]
    async fn test_remove_unknown_location_is_error() {
        let f = fixture();
        let state = f.journal.remove_location("00000").await;
        assert!(state.error().is_some());
    }

    #[tokio::test]
    async fn test_edit_and_clear_note() {
        let f = fixture();
        seed(&f, "28079", 1);

        let edited = f
            .journal
            .edit_note("28079", "2025-05-11T00:00", Some("Frost on the car".into()))
            .await
            .success()
            .unwrap();
        assert_eq!(edited.user_note.as_deref(), Some("Frost on the car"));

        let cleared = f
            .journal
            .edit_note("28079", "2025-05-11T00:00", Some("   ".into()))
            .await
            .success()
            .unwrap();
        assert_eq!(cleared.user_note, None);
    }

    #[tokio::test]
    async fn test_edit_missing_snapshot_is_error() {
        let f = fixture();
        let state = f
            .journal
            .edit_note("28079", "2025-05-11T00:00", Some("note".into()))
            .await;
        assert!(!state.is_success());
    }

    #[tokio::test]
    async fn test_delete_snapshot() {
        let f = fixture();
        seed(&f, "28079", 2);

        assert!(f.journal.delete_snapshot("28079", "2025-05-11T01:00").await.is_success());
        let history = f.journal.history("28079").await.success().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp, "2025-05-11T00:00");

        assert!(!f.journal.delete_snapshot("28079", "2025-05-11T01:00").await.is_success());
    }

    #[tokio::test]
    async fn test_set_retention_trims_immediately() {
        let f = fixture();
        f.journal
            .add_location(Location::new("28079", "Madrid"), FrequencyPolicy::Hourly)
            .await;
        seed(&f, "28079", 20);

        let removed = f
            .journal
            .set_retention("28079", RetentionPolicy::MaxSnapshots(15))
            .await;
        assert_eq!(removed, LoadState::Success(5));

        let history = f.journal.history("28079").await.success().unwrap();
        assert_eq!(history.len(), 15);
        assert_eq!(history[0].timestamp, "2025-05-11T19:00");
    }

    #[tokio::test]
    async fn test_set_global_retention_trims_all() {
        let f = fixture();
        f.journal
            .add_location(Location::new("28079", "Madrid"), FrequencyPolicy::Hourly)
            .await;
        seed(&f, "28079", 20);

        let report = f
            .journal
            .set_global_retention(RetentionPolicy::MaxSnapshots(10))
            .await
            .success()
            .unwrap();
        assert_eq!(report.deleted, 10);
        assert_eq!(
            f.journal.retention("28079").await,
            LoadState::Success(RetentionPolicy::MaxSnapshots(10))
        );
    }
}
