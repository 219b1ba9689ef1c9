//! Fakes shared by unit tests.

use async_trait::async_trait;
use meteolog_core::DatabaseError;
use meteolog_weather::{HourlyForecastRecord, Location, WeatherError, WeatherSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::locations::LocationSource;

/// Canned forecasts keyed by location id. Unknown ids fail.
#[derive(Default)]
pub struct FakeWeather {
    forecasts: HashMap<String, Vec<HourlyForecastRecord>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeWeather {
    pub fn with(mut self, location_id: &str, records: Vec<HourlyForecastRecord>) -> Self {
        self.forecasts.insert(location_id.to_string(), records);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for FakeWeather {
    async fn hourly_forecast(
        &self,
        location_id: &str,
    ) -> Result<Vec<HourlyForecastRecord>, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.forecasts
            .get(location_id)
            .cloned()
            .ok_or_else(|| WeatherError::Unavailable(format!("no forecast for {}", location_id)))
    }
}

/// Location source whose storage is always offline.
#[derive(Default)]
pub struct BrokenLocations {
    calls: AtomicUsize,
}

impl BrokenLocations {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationSource for BrokenLocations {
    fn list_tracked(&self) -> StoreResult<Vec<Location>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Database(DatabaseError::ConnectionFailed(
            "offline".into(),
        )))
    }
}

/// A full day of hours; 14:00 reads 22 degrees and "Cubierto".
pub fn madrid_forecast() -> Vec<HourlyForecastRecord> {
    (0..24)
        .map(|h: i32| HourlyForecastRecord {
            hour: format!("{:02}", h),
            temperature: Some(if h == 14 { 22 } else { 10 + h / 2 }),
            condition: Some(if h == 14 { "Cubierto" } else { "Despejado" }.to_string()),
            ..Default::default()
        })
        .collect()
}
