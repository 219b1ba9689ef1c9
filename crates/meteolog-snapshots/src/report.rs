use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format of every snapshot timestamp: hour precision, no zone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:00";

/// Historical weather observation for one location and one hour.
///
/// Weather fields are copied verbatim from the forecast and stay `None` when
/// the provider omitted them. Only `user_note` changes after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub timestamp: String,
    pub location_id: String,
    pub location_name: String,
    pub temperature: Option<i32>,
    pub feels_like: Option<i32>,
    pub condition: Option<String>,
    pub precipitation: Option<f64>,
    pub snow: Option<f64>,
    pub humidity: Option<i32>,
    pub wind_direction: Option<String>,
    pub wind_speed: Option<i32>,
    pub max_gust: Option<i32>,
    pub user_note: Option<String>,
}

impl SnapshotReport {
    /// An empty report for `(location_id, timestamp)`.
    pub fn new(
        timestamp: impl Into<String>,
        location_id: impl Into<String>,
        location_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            location_id: location_id.into(),
            location_name: location_name.into(),
            temperature: None,
            feels_like: None,
            condition: None,
            precipitation: None,
            snow: None,
            humidity: None,
            wind_direction: None,
            wind_speed: None,
            max_gust: None,
            user_note: None,
        }
    }

    /// The timestamp as an instant, or `None` for fallback-formatted values.
    pub fn instant(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_instant_parses_hour_precision() {
        let report = SnapshotReport::new("2025-05-11T14:00", "28079", "Madrid");
        let instant = report.instant();
        assert_eq!(
            instant,
            NaiveDate::from_ymd_opt(2025, 5, 11).and_then(|d| d.and_hms_opt(14, 0, 0))
        );
        assert_eq!(instant.map(|i| i.hour()), Some(14));
    }

    #[test]
    fn test_instant_rejects_fallback_timestamp() {
        let report = SnapshotReport::new("2025-05-11Tx:00", "28079", "Madrid");
        assert!(report.instant().is_none());
    }
}
