use meteolog_core::{AppError, Config, ConfigError};
use meteolog_snapshots::{
    CaptureScheduler, CaptureSettings, CaptureTrigger, Journal, RetentionEnforcer,
    RetentionPolicy, RetentionPolicyStore, SqliteFrequencyPolicyStore, SqliteLocationStore,
    SqliteRetentionPolicyStore, SqliteSnapshotStore,
};
use meteolog_weather::HttpWeatherSource;
use parking_lot::Mutex;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meteolog_core::init()?;

    if let Err(e) = run().await {
        tracing::error!("{} ({})", e.user_message(), e);
        return Err(e.into());
    }
    Ok(())
}

async fn run() -> Result<(), AppError> {
    let (config, _) =
        Config::load_validated().map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;

    let db_path = config.database_path();
    tracing::info!("Opening snapshot journal at {}", db_path.display());

    let locations = Arc::new(Mutex::new(SqliteLocationStore::open(&db_path)?));
    let snapshots = Arc::new(Mutex::new(SqliteSnapshotStore::open(&db_path)?));
    let frequencies = Arc::new(Mutex::new(SqliteFrequencyPolicyStore::open(&db_path)?));
    let retention = Arc::new(Mutex::new(SqliteRetentionPolicyStore::open(&db_path)?));

    retention
        .lock()
        .set_global(RetentionPolicy::from(config.retention.default_max_snapshots))?;

    let weather = HttpWeatherSource::new(&config.weather.api_url, config.weather.api_key.clone())
        .map_err(|e| AppError::Other(e.into()))?;

    let enforcer = Arc::new(RetentionEnforcer::new(
        snapshots.clone(),
        retention.clone(),
        locations.clone(),
    ));

    let journal = Journal::new(
        locations.clone(),
        snapshots.clone(),
        frequencies.clone(),
        retention,
        enforcer.clone(),
    );
    if let Some(tracked) = journal.tracked_locations().await.success() {
        tracing::info!("Tracking {} locations", tracked.len());
    }

    // Catch up on limits that changed while the daemon was down.
    let startup = enforcer.enforce_all().await?;
    tracing::info!(
        "Startup retention checked {} locations, removed {} snapshots",
        startup.locations_checked,
        startup.deleted
    );

    let scheduler = CaptureScheduler::new(
        locations,
        frequencies,
        snapshots,
        Arc::new(weather),
        CaptureSettings::from(&config.capture),
    );

    let mut trigger = CaptureTrigger::from_config(scheduler, &config.capture);
    if config.capture.enforce_retention_after_capture {
        trigger = trigger.with_retention(enforcer);
    }
    trigger.ensure_scheduled();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    trigger.shutdown().await;

    Ok(())
}
