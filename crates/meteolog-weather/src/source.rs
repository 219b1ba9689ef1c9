use async_trait::async_trait;

use crate::types::{HourlyForecastRecord, WeatherError};

/// Anything that can produce the hourly forecast for a location.
///
/// The capture pipeline treats every error from this trait as a skippable
/// per-location failure.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Full hourly forecast for `location_id`, in provider order.
    async fn hourly_forecast(
        &self,
        location_id: &str,
    ) -> Result<Vec<HourlyForecastRecord>, WeatherError>;
}
