//! Snapshot lifecycle for Meteolog
//!
//! Captures one forecast-derived snapshot per tracked location and hour,
//! stores it, and trims each location's history to its retention limit.

pub mod error;
pub mod journal;
pub mod labels;
pub mod locations;
pub mod mapper;
pub mod policy;
pub mod policy_store;
pub mod report;
pub mod retention;
pub mod scheduler;
pub mod schema;
pub mod state;
pub mod store;
pub mod trigger;

#[cfg(test)]
mod testing;

use parking_lot::Mutex;
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use journal::Journal;
pub use locations::{LocationSource, LocationStore, SqliteLocationStore};
pub use policy::{FrequencyPolicy, RetentionPolicy};
pub use policy_store::{
    FrequencyPolicyStore, RetentionPolicyStore, SqliteFrequencyPolicyStore,
    SqliteRetentionPolicyStore,
};
pub use report::SnapshotReport;
pub use retention::{RetentionEnforcer, RetentionReport};
pub use scheduler::{CaptureOutcome, CaptureScheduler, CaptureSettings, CycleReport};
pub use state::LoadState;
pub use store::{SnapshotStore, SqliteSnapshotStore};
pub use trigger::CaptureTrigger;

pub type SharedSnapshotStore = Arc<Mutex<dyn SnapshotStore>>;
pub type SharedFrequencyStore = Arc<Mutex<dyn FrequencyPolicyStore>>;
pub type SharedRetentionStore = Arc<Mutex<dyn RetentionPolicyStore>>;
pub type SharedLocationSource = Arc<Mutex<dyn LocationSource>>;
pub type SharedLocationStore = Arc<Mutex<dyn LocationStore>>;

/// Run a store call on the blocking pool so SQLite never stalls the runtime.
pub(crate) async fn run_blocking<S, T, F>(store: &Arc<Mutex<S>>, f: F) -> StoreResult<T>
where
    S: ?Sized + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let guard = store.lock();
        f(&*guard)
    })
    .await?
}
