//! Forecast record to snapshot conversion.
//!
//! Pure functions: no clock, no I/O. A timestamp that cannot be built from
//! `date` and the hour label falls back to plain string concatenation so a
//! formatting fault never aborts a capture.

use chrono::NaiveDate;
use meteolog_weather::HourlyForecastRecord;

use crate::report::{SnapshotReport, TIMESTAMP_FORMAT};

/// Build the hour-precision timestamp for `hour` on `date` (`YYYY-MM-DD`).
pub fn snapshot_timestamp(date: &str, hour: &str) -> String {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .zip(hour.trim().parse::<u32>().ok())
        .and_then(|(day, h)| day.and_hms_opt(h, 0, 0));

    match parsed {
        Some(instant) => instant.format(TIMESTAMP_FORMAT).to_string(),
        None => {
            tracing::debug!("Falling back to raw timestamp for date={} hour={}", date, hour);
            format!("{}T{:0>2}:00", date, hour.trim())
        }
    }
}

/// Map one forecast hour into a snapshot for `location_id` on `date`.
pub fn map_hourly(
    record: &HourlyForecastRecord,
    date: &str,
    location_id: &str,
    location_name: &str,
) -> SnapshotReport {
    SnapshotReport {
        timestamp: snapshot_timestamp(date, &record.hour),
        location_id: location_id.to_string(),
        location_name: location_name.to_string(),
        temperature: record.temperature,
        feels_like: record.feels_like,
        condition: record.condition.clone(),
        precipitation: record.precipitation,
        snow: record.snow,
        humidity: record.humidity,
        wind_direction: record.wind_direction.clone(),
        wind_speed: record.wind_speed,
        max_gust: record.max_gust,
        user_note: None,
    }
}

/// Map every forecast hour, keeping provider order.
pub fn map_all(
    records: &[HourlyForecastRecord],
    date: &str,
    location_id: &str,
    location_name: &str,
) -> Vec<SnapshotReport> {
    records
        .iter()
        .map(|record| map_hourly(record, date, location_id, location_name))
        .collect()
}
