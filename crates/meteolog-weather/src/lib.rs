//! Forecast access for Meteolog
//!
//! Defines the `WeatherSource` seam the snapshot pipeline consumes, plus an
//! HTTP implementation with retry on transient failures.

pub mod provider;
pub mod retry;
pub mod source;
pub mod types;

pub use provider::HttpWeatherSource;
pub use retry::RetryConfig;
pub use source::WeatherSource;
pub use types::*;
