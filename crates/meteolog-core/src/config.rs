use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Semicolon-joined summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the snapshot database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capture scheduling settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Global retention fallback
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Forecast provider settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Minutes between capture cycles
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,

    /// Hard limit for a single cycle before in-flight captures are abandoned
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// Upper bound on locations captured at the same time
    #[serde(default = "default_max_concurrent_captures")]
    pub max_concurrent_captures: usize,

    /// How many times a failed cycle is retried before waiting for the next tick
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Run the retention enforcer after every successful cycle
    #[serde(default = "default_true")]
    pub enforce_retention_after_capture: bool,

    /// Hour of day (0-23) at which `daily` locations are captured
    #[serde(default = "default_daily_capture_hour")]
    pub daily_capture_hour: u32,
}

fn default_interval_minutes() -> u32 {
    60
}

fn default_cycle_timeout_secs() -> u64 {
    600
}

fn default_max_concurrent_captures() -> usize {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_daily_capture_hour() -> u32 {
    12
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            max_concurrent_captures: default_max_concurrent_captures(),
            retry_attempts: default_retry_attempts(),
            enforce_retention_after_capture: default_true(),
            daily_capture_hour: default_daily_capture_hour(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Snapshots kept per location when no per-location limit is set.
    /// `None` keeps everything.
    #[serde(default)]
    pub default_max_snapshots: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL of the hourly forecast gateway
    pub api_url: String,

    /// API key (optional, can be set via METEOLOG_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            api_key: std::env::var("METEOLOG_API_KEY").ok(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meteolog")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            capture: CaptureConfig::default(),
            retention: RetentionConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let mut config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        if config.weather.api_key.is_none() {
            config.weather.api_key = std::env::var("METEOLOG_API_KEY").ok();
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_url, "weather.api_url", &mut result);

        let capture = &self.capture;
        if capture.interval_minutes == 0 {
            result.add_error("capture.interval_minutes", "Capture interval must be greater than 0");
        } else if capture.interval_minutes > 60 {
            result.add_warning(
                "capture.interval_minutes",
                format!(
                    "Capture interval of {} minutes is coarser than hourly; hourly policies will miss hours",
                    capture.interval_minutes
                ),
            );
        }

        if capture.cycle_timeout_secs == 0 {
            result.add_error("capture.cycle_timeout_secs", "Cycle timeout must be greater than 0");
        } else if capture.interval_minutes > 0
            && capture.cycle_timeout_secs > u64::from(capture.interval_minutes) * 60
        {
            result.add_warning(
                "capture.cycle_timeout_secs",
                "Cycle timeout exceeds the capture interval; cycles may overlap",
            );
        }

        if capture.max_concurrent_captures == 0 {
            result.add_error(
                "capture.max_concurrent_captures",
                "At least one concurrent capture is required",
            );
        }

        if capture.daily_capture_hour > 23 {
            result.add_error(
                "capture.daily_capture_hour",
                format!("Hour must be between 0 and 23, got {}", capture.daily_capture_hour),
            );
        }

        if self.retention.default_max_snapshots == Some(0) {
            result.add_warning(
                "retention.default_max_snapshots",
                "A global limit of 0 deletes every snapshot on each retention run",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the snapshot database inside `data_dir`
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("meteolog.db")
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("meteolog");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.api_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.api_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_interval_is_error() {
        let mut config = Config::default();
        config.capture.interval_minutes = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "capture.interval_minutes"));
    }

    #[test]
    fn test_coarse_interval_is_warning() {
        let mut config = Config::default();
        config.capture.interval_minutes = 15 * 60;
        config.capture.cycle_timeout_secs = 600;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "capture.interval_minutes"));
    }

    #[test]
    fn test_daily_hour_out_of_range() {
        let mut config = Config::default();
        config.capture.daily_capture_hour = 24;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_zero_concurrency_is_error() {
        let mut config = Config::default();
        config.capture.max_concurrent_captures = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.capture.interval_minutes, 60);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_dir = \"/tmp/meteolog\"\n\n[capture]\ninterval_minutes = 30\n\n[retention]\ndefault_max_snapshots = 15\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.capture.interval_minutes, 30);
        assert_eq!(config.capture.max_concurrent_captures, 8);
        assert_eq!(config.retention.default_max_snapshots, Some(15));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/meteolog/meteolog.db"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.capture.daily_capture_hour = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.capture.daily_capture_hour, 7);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
