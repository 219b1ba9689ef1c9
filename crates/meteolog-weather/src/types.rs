use meteolog_core::NetworkError;
use serde::{Deserialize, Serialize};

/// A tracked municipality. Identity is the provider-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub display_name: String,
}

impl Location {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One hour of a provider forecast. Every metric may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecastRecord {
    /// Hour of day label, normally "00".."23"
    pub hour: String,
    #[serde(default)]
    pub temperature: Option<i32>,
    #[serde(default)]
    pub feels_like: Option<i32>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub snow: Option<f64>,
    #[serde(default)]
    pub humidity: Option<i32>,
    #[serde(default)]
    pub wind_direction: Option<String>,
    #[serde(default)]
    pub wind_speed: Option<i32>,
    #[serde(default)]
    pub max_gust: Option<i32>,
}

impl HourlyForecastRecord {
    pub fn new(hour: impl Into<String>) -> Self {
        Self {
            hour: hour.into(),
            ..Default::default()
        }
    }

    /// The hour label trimmed and left-padded with zeros to two characters,
    /// so providers that send "9" still compare equal to "09".
    pub fn hour_label(&self) -> String {
        format!("{:0>2}", self.hour.trim())
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Forecast request for {location_id} failed with status {status}")]
    Status { location_id: String, status: u16 },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Forecast unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_hour_label_pads_single_digit() {
        assert_eq!(HourlyForecastRecord::new("9").hour_label(), "09");
        assert_eq!(HourlyForecastRecord::new(" 7 ").hour_label(), "07");
    }

    #[test]
    fn test_hour_label_keeps_two_digits() {
        assert_eq!(HourlyForecastRecord::new("14").hour_label(), "14");
        assert_eq!(HourlyForecastRecord::new("00").hour_label(), "00");
    }

    #[test]
    fn test_deserialize_with_missing_metrics() {
        let record: HourlyForecastRecord =
            serde_json::from_str(r#"{"hour": "14", "temperature": 22, "condition": "Cubierto"}"#)
                .unwrap();

        assert_eq!(record.hour, "14");
        assert_eq!(record.temperature, Some(22));
        assert_eq!(record.condition.as_deref(), Some("Cubierto"));
        assert_eq!(record.snow, None);
        assert_eq!(record.max_gust, None);
    }

    #[test]
    fn test_deserialize_explicit_nulls() {
        let record: HourlyForecastRecord =
            serde_json::from_str(r#"{"hour": "03", "humidity": null, "precipitation": 0.4}"#)
                .unwrap();

        assert_eq!(record.humidity, None);
        assert_eq!(record.precipitation, Some(0.4));
    }

    #[test]
    fn test_status_error_display() {
        let err = WeatherError::Status { location_id: "28079".into(), status: 503 };
        assert!(err.to_string().contains("28079"));
        assert!(err.to_string().contains("503"));
    }
}
