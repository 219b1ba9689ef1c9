//! One capture cycle over every tracked location.
//!
//! Each location is an independent unit of work running on its own task.
//! A forecast failure or a missing hour only skips that location; the cycle
//! fails as a whole only when locations or storage can't be reached.

use chrono::{Local, NaiveDateTime, Timelike};
use meteolog_core::{CaptureConfig, CaptureError};
use meteolog_weather::{Location, WeatherSource};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::StoreError;
use crate::mapper;
use crate::policy::FrequencyPolicy;
use crate::{run_blocking, SharedFrequencyStore, SharedLocationSource, SharedSnapshotStore};

/// Knobs for a capture cycle.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub max_concurrent_captures: usize,
    pub daily_capture_hour: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            max_concurrent_captures: config.max_concurrent_captures.max(1),
            daily_capture_hour: config.daily_capture_hour,
        }
    }
}

/// What happened to one location in a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Snapshot written with this timestamp.
    Captured(String),
    SkippedManual,
    /// Policy does not capture at this hour.
    NotDue(FrequencyPolicy),
    /// Forecast had no entry for the current hour.
    MissingHour,
    /// Location stopped being tracked while its capture was in flight.
    Untracked,
    /// Forecast fetch or parse failed.
    Failed(String),
    /// Policy read or snapshot write failed.
    StorageFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationCapture {
    pub location_id: String,
    pub outcome: CaptureOutcome,
}

/// Result of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub date: String,
    pub hour: String,
    pub captures: Vec<LocationCapture>,
    /// Tasks that died without reporting (panics).
    pub lost_tasks: usize,
}

impl CycleReport {
    fn new(date: String, hour: String) -> Self {
        Self {
            date,
            hour,
            ..Default::default()
        }
    }

    pub fn captured(&self) -> usize {
        self.count(|o| matches!(o, CaptureOutcome::Captured(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                CaptureOutcome::SkippedManual
                    | CaptureOutcome::NotDue(_)
                    | CaptureOutcome::MissingHour
                    | CaptureOutcome::Untracked
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CaptureOutcome::Failed(_) | CaptureOutcome::StorageFailed(_)))
    }

    pub fn outcome_for(&self, location_id: &str) -> Option<&CaptureOutcome> {
        self.captures
            .iter()
            .find(|c| c.location_id == location_id)
            .map(|c| &c.outcome)
    }

    fn count(&self, pred: impl Fn(&CaptureOutcome) -> bool) -> usize {
        self.captures.iter().filter(|c| pred(&c.outcome)).count()
    }

    fn storage_failure(&self) -> Option<&str> {
        self.captures.iter().find_map(|c| match &c.outcome {
            CaptureOutcome::StorageFailed(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}T{}:00 captured={} skipped={} failed={}",
            self.date,
            self.hour,
            self.captured(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Shared handles a per-location task needs.
#[derive(Clone)]
struct CaptureContext {
    locations: SharedLocationSource,
    frequencies: SharedFrequencyStore,
    snapshots: SharedSnapshotStore,
    weather: Arc<dyn WeatherSource>,
    daily_capture_hour: u32,
}

impl CaptureContext {
    async fn capture(&self, location: &Location, date: &str, hour: &str, hour_num: u32) -> CaptureOutcome {
        match self.try_capture(location, date, hour, hour_num).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Storage failure while capturing {}: {}", location.id, e);
                CaptureOutcome::StorageFailed(e.to_string())
            }
        }
    }

    async fn try_capture(
        &self,
        location: &Location,
        date: &str,
        hour: &str,
        hour_num: u32,
    ) -> Result<CaptureOutcome, StoreError> {
        let id = location.id.clone();
        let policy = run_blocking(&self.frequencies, move |s| s.get(&id)).await?;

        if policy == FrequencyPolicy::Manual {
            return Ok(CaptureOutcome::SkippedManual);
        }
        if !policy.is_due(hour_num, self.daily_capture_hour) {
            tracing::debug!("{} not due at {} under {:?}", location.id, hour, policy);
            return Ok(CaptureOutcome::NotDue(policy));
        }

        let records = match self.weather.hourly_forecast(&location.id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Forecast for {} failed: {}", location.id, e);
                return Ok(CaptureOutcome::Failed(e.to_string()));
            }
        };

        // Exact label match only: "123" or "14:00" never stand in for an hour.
        let current = records
            .iter()
            .zip(mapper::map_all(&records, date, &location.id, &location.display_name))
            .find(|(record, _)| record.hour_label() == hour)
            .map(|(_, report)| report);

        let Some(report) = current else {
            tracing::info!("No forecast entry for {} at hour {}, skipping", location.id, hour);
            return Ok(CaptureOutcome::MissingHour);
        };

        let id = location.id.clone();
        if !run_blocking(&self.locations, move |s| s.is_tracked(&id)).await? {
            tracing::info!("{} was removed during capture, dropping snapshot", location.id);
            return Ok(CaptureOutcome::Untracked);
        }

        let timestamp = report.timestamp.clone();
        run_blocking(&self.snapshots, move |s| s.append(&report)).await?;
        tracing::debug!("Captured {} for {}", timestamp, location.id);

        Ok(CaptureOutcome::Captured(timestamp))
    }
}

/// Runs capture cycles.
pub struct CaptureScheduler {
    locations: SharedLocationSource,
    context: CaptureContext,
    max_concurrent_captures: usize,
}

impl CaptureScheduler {
    pub fn new(
        locations: SharedLocationSource,
        frequencies: SharedFrequencyStore,
        snapshots: SharedSnapshotStore,
        weather: Arc<dyn WeatherSource>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            locations: Arc::clone(&locations),
            context: CaptureContext {
                locations,
                frequencies,
                snapshots,
                weather,
                daily_capture_hour: settings.daily_capture_hour,
            },
            max_concurrent_captures: settings.max_concurrent_captures.max(1),
        }
    }

    /// Run a cycle for the current local date and hour.
    pub async fn run_cycle_now(&self) -> Result<CycleReport, CaptureError> {
        self.run_cycle(Local::now().naive_local()).await
    }

    /// Run one capture cycle as of `now`.
    ///
    /// Every per-location task is joined before returning. Dropping the
    /// returned future aborts tasks still in flight; writes that already
    /// completed are kept.
    ///
    /// # Errors
    /// `CaptureError::LocationsUnavailable` when the tracked list can't be
    /// read, `CaptureError::StorageUnavailable` when a policy read or a
    /// snapshot write failed. Both mean the whole cycle should be retried.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<CycleReport, CaptureError> {
        let date = now.date().format("%Y-%m-%d").to_string();
        let hour_num = now.hour();
        let hour = format!("{:02}", hour_num);

        let locations = run_blocking(&self.locations, |s| s.list_tracked())
            .await
            .map_err(|e| CaptureError::LocationsUnavailable(e.to_string()))?;

        tracing::info!(
            "Capture cycle {}T{}:00 starting for {} locations",
            date,
            hour,
            locations.len()
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent_captures));
        let mut tasks = JoinSet::new();

        for location in locations {
            let context = self.context.clone();
            let permits = Arc::clone(&permits);
            let date = date.clone();
            let hour = hour.clone();

            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is dropped.
                let _permit = permits.acquire_owned().await.ok();
                let outcome = context.capture(&location, &date, &hour, hour_num).await;
                LocationCapture {
                    location_id: location.id,
                    outcome,
                }
            });
        }

        let mut report = CycleReport::new(date, hour);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(capture) => report.captures.push(capture),
                Err(e) => {
                    tracing::error!("Capture task ended abnormally: {}", e);
                    report.lost_tasks += 1;
                }
            }
        }

        if let Some(msg) = report.storage_failure() {
            tracing::warn!("Capture cycle incomplete: {}", report);
            return Err(CaptureError::StorageUnavailable(msg.to_string()));
        }

        tracing::info!("Capture cycle complete: {}", report);
        Ok(report)
    }
}
