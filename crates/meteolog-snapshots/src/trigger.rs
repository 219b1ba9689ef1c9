//! Periodic capture trigger.
//!
//! Owns the single background task that runs capture cycles on an interval.
//! Registration is idempotent: a live task is never replaced or duplicated.

use meteolog_core::{CaptureConfig, CaptureError};
use meteolog_weather::RetryConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::retention::RetentionEnforcer;
use crate::scheduler::{CaptureScheduler, CycleReport};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Backoff for failed cycles: 30s doubling up to 10 minutes.
const RETRY_INITIAL_DELAY_MS: u64 = 30_000;
const RETRY_MAX_DELAY_MS: u64 = 600_000;

struct Registration {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// One cycle plus the retention pass that follows it.
#[derive(Clone)]
struct CycleRunner {
    scheduler: Arc<CaptureScheduler>,
    enforcer: Option<Arc<RetentionEnforcer>>,
    cycle_timeout: Duration,
}

impl CycleRunner {
    async fn run(&self) -> Result<CycleReport, CaptureError> {
        let report = match tokio::time::timeout(self.cycle_timeout, self.scheduler.run_cycle_now()).await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Capture cycle exceeded {:?}, abandoning", self.cycle_timeout);
                return Err(CaptureError::TimedOut(self.cycle_timeout.as_secs()));
            }
        };

        if let Some(enforcer) = &self.enforcer {
            if let Err(e) = enforcer.enforce_all().await {
                tracing::warn!("Retention after capture failed: {}", e);
            }
        }
        Ok(report)
    }

    /// Run until a cycle succeeds or retries run out. `None` when cancelled.
    async fn run_with_retry(
        &self,
        retry: &RetryConfig,
        cancel: &CancellationToken,
    ) -> Option<Result<CycleReport, CaptureError>> {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.run() => result,
            };

            match result {
                Ok(report) => return Some(Ok(report)),
                Err(e) if attempt < retry.max_retries => {
                    let delay = retry.delay_for_attempt(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Capture cycle failed ({}), retry {} of {} in {:?}",
                        e,
                        attempt,
                        retry.max_retries,
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Capture cycle failed after {} attempts: {}",
                        attempt + 1,
                        e.user_message()
                    );
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Schedules capture cycles in the background.
pub struct CaptureTrigger {
    runner: CycleRunner,
    interval: Duration,
    retry: RetryConfig,
    registration: Mutex<Option<Registration>>,
}

impl CaptureTrigger {
    pub fn new(scheduler: CaptureScheduler) -> Self {
        Self {
            runner: CycleRunner {
                scheduler: Arc::new(scheduler),
                enforcer: None,
                cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            },
            interval: DEFAULT_INTERVAL,
            retry: RetryConfig::new(3, RETRY_INITIAL_DELAY_MS, RETRY_MAX_DELAY_MS),
            registration: Mutex::new(None),
        }
    }

    /// Build a trigger with interval, timeout and retry taken from config.
    pub fn from_config(scheduler: CaptureScheduler, config: &CaptureConfig) -> Self {
        Self::new(scheduler)
            .with_interval(Duration::from_secs(u64::from(config.interval_minutes.max(1)) * 60))
            .with_cycle_timeout(Duration::from_secs(config.cycle_timeout_secs.max(1)))
            .with_retry(RetryConfig::new(
                config.retry_attempts,
                RETRY_INITIAL_DELAY_MS,
                RETRY_MAX_DELAY_MS,
            ))
    }

    /// Run retention after every successful cycle.
    pub fn with_retention(mut self, enforcer: Arc<RetentionEnforcer>) -> Self {
        self.runner.enforcer = Some(enforcer);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.runner.cycle_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the periodic task unless one is already running.
    ///
    /// Returns `true` when a new task was started. An existing live task is
    /// kept as is, so calling this on every startup never duplicates work.
    /// Must be called from within a Tokio runtime.
    pub fn ensure_scheduled(&self) -> bool {
        let mut registration = self.registration.lock();

        if let Some(existing) = registration.as_ref() {
            if !existing.handle.is_finished() {
                tracing::debug!("Capture trigger already scheduled");
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.runner.clone(),
            self.interval,
            self.retry.clone(),
            cancel.clone(),
        ));
        *registration = Some(Registration { handle, cancel });

        tracing::info!("Capture trigger scheduled every {:?}", self.interval);
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.registration
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Stop the periodic task and wait for it to wind down.
    pub async fn shutdown(&self) {
        let Some(registration) = self.registration.lock().take() else {
            return;
        };

        registration.cancel.cancel();
        if let Err(e) = registration.handle.await {
            tracing::warn!("Capture trigger ended abnormally: {}", e);
        }
        tracing::info!("Capture trigger stopped");
    }

    /// Run a single cycle now, without retries.
    pub async fn run_once(&self) -> Result<CycleReport, CaptureError> {
        self.runner.run().await
    }
}

impl Drop for CaptureTrigger {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.get_mut().take() {
            registration.cancel.cancel();
        }
    }
}

async fn run_loop(
    runner: CycleRunner,
    period: Duration,
    retry: RetryConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if runner.run_with_retry(&retry, &cancel).await.is_none() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::locations::{LocationStore, SqliteLocationStore};
    use crate::policy::FrequencyPolicy;
    use crate::policy_store::{FrequencyPolicyStore, SqliteFrequencyPolicyStore};
    use crate::scheduler::CaptureSettings;
    use crate::store::{SnapshotStore, SqliteSnapshotStore};
    use crate::testing::{madrid_forecast, BrokenLocations, FakeWeather};
    use meteolog_weather::{Location, WeatherSource};

    fn scheduler_with(
        locations: crate::SharedLocationSource,
        weather: Arc<dyn WeatherSource>,
        snapshots: Arc<Mutex<SqliteSnapshotStore>>,
    ) -> CaptureScheduler {
        let frequencies = Arc::new(Mutex::new(SqliteFrequencyPolicyStore::in_memory().unwrap()));
        frequencies.lock().set("28079", FrequencyPolicy::Hourly).unwrap();
        CaptureScheduler::new(
            locations,
            frequencies,
            snapshots,
            weather,
            CaptureSettings::default(),
        )
    }

    fn madrid_scheduler(
        weather: Arc<dyn WeatherSource>,
    ) -> (CaptureScheduler, Arc<Mutex<SqliteSnapshotStore>>) {
        let locations = Arc::new(Mutex::new(SqliteLocationStore::in_memory().unwrap()));
        locations.lock().add(&Location::new("28079", "Madrid")).unwrap();
        let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::in_memory().unwrap()));
        (
            scheduler_with(locations, weather, snapshots.clone()),
            snapshots,
        )
    }

    #[tokio::test]
    async fn test_ensure_scheduled_is_idempotent() {
        let (scheduler, _) = madrid_scheduler(Arc::new(FakeWeather::default()));
        let trigger = CaptureTrigger::new(scheduler).with_retry(RetryConfig::new(0, 0, 0));

        assert!(trigger.ensure_scheduled());
        assert!(!trigger.ensure_scheduled());
        assert!(trigger.is_scheduled());

        trigger.shutdown().await;
        assert!(!trigger.is_scheduled());

        assert!(trigger.ensure_scheduled());
        trigger.shutdown().await;
    }

    #[tokio::test]
    async fn test_scheduled_task_captures() {
        let weather = Arc::new(FakeWeather::default().with("28079", madrid_forecast()));
        let (scheduler, snapshots) = madrid_scheduler(weather);
        let trigger = CaptureTrigger::new(scheduler);

        trigger.ensure_scheduled();

        let captured = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if snapshots.lock().count_by_location("28079").unwrap() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(captured.is_ok());

        trigger.shutdown().await;
    }

    #[tokio::test]
    async fn test_run_once_reports_unreadable_locations() {
        let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::in_memory().unwrap()));
        let scheduler = scheduler_with(
            Arc::new(Mutex::new(BrokenLocations::default())),
            Arc::new(FakeWeather::default()),
            snapshots,
        );
        let trigger = CaptureTrigger::new(scheduler);

        let result = trigger.run_once().await;
        assert!(matches!(result, Err(CaptureError::LocationsUnavailable(_))));
    }

    #[tokio::test]
    async fn test_slow_cycle_times_out() {
        let weather = Arc::new(
            FakeWeather::default()
                .with("28079", madrid_forecast())
                .slow(Duration::from_secs(30)),
        );
        let (scheduler, snapshots) = madrid_scheduler(weather);
        let trigger =
            CaptureTrigger::new(scheduler).with_cycle_timeout(Duration::from_millis(50));

        let result = trigger.run_once().await;

        assert!(matches!(result, Err(CaptureError::TimedOut(_))));
        assert_eq!(snapshots.lock().count_by_location("28079").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_cycle_is_retried() {
        let broken = Arc::new(Mutex::new(BrokenLocations::default()));
        let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::in_memory().unwrap()));
        let scheduler =
            scheduler_with(broken.clone(), Arc::new(FakeWeather::default()), snapshots);
        let trigger = CaptureTrigger::new(scheduler);

        let result = trigger
            .runner
            .run_with_retry(&RetryConfig::new(2, 0, 0), &CancellationToken::new())
            .await;

        assert!(matches!(result, Some(Err(CaptureError::LocationsUnavailable(_)))));
        assert_eq!(broken.lock().calls(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_retry_returns_none() {
        let broken = Arc::new(Mutex::new(BrokenLocations::default()));
        let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::in_memory().unwrap()));
        let scheduler = scheduler_with(broken, Arc::new(FakeWeather::default()), snapshots);
        let trigger = CaptureTrigger::new(scheduler);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = trigger
            .runner
            .run_with_retry(&RetryConfig::new(2, 0, 0), &cancel)
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_from_config() {
        let (scheduler, _) = madrid_scheduler(Arc::new(FakeWeather::default()));
        let config = CaptureConfig {
            interval_minutes: 120,
            ..CaptureConfig::default()
        };
        let trigger = CaptureTrigger::from_config(scheduler, &config);
        assert_eq!(trigger.interval(), Duration::from_secs(7200));
        assert_eq!(trigger.retry.max_retries, config.retry_attempts);
    }
}
