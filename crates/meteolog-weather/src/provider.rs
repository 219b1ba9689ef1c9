//! HTTP forecast source.
//!
//! Talks to a forecast gateway exposing `GET {base}/locations/{id}/hourly`,
//! which answers `{"hours": [...]}` with one entry per forecast hour.

use async_trait::async_trait;
use meteolog_core::error::ReqwestErrorExt;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::retry::{with_retry, RetryConfig};
use crate::source::WeatherSource;
use crate::types::{HourlyForecastRecord, WeatherError};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Meteolog/0.1.0";
const API_KEY_HEADER: &str = "api_key";

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    #[serde(default)]
    hours: Vec<HourlyForecastRecord>,
}

#[derive(Debug, Clone)]
pub struct HttpWeatherSource {
    client: Arc<Client>,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpWeatherSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, WeatherError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| WeatherError::Unavailable(format!("invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(WeatherError::Unavailable(format!(
                "base URL cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            base_url,
            api_key,
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy (tests use a zero-delay one).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn hourly_url(&self, location_id: &str) -> Result<Url, WeatherError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| WeatherError::Unavailable(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .push("locations")
            .push(location_id)
            .push("hourly");
        Ok(url)
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherSource {
    async fn hourly_forecast(
        &self,
        location_id: &str,
    ) -> Result<Vec<HourlyForecastRecord>, WeatherError> {
        let url = self.hourly_url(location_id)?;

        let response = with_retry(self.retry.clone(), || {
            let mut request = self.client.get(url.clone());
            if let Some(key) = &self.api_key {
                request = request.header(API_KEY_HEADER, key);
            }
            request.send()
        })
        .await
        .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Hourly forecast for {} returned status {}", location_id, status);
            return Err(WeatherError::Status {
                location_id: location_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let parsed: HourlyResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::Parse(format!("hourly forecast for {}: {}", location_id, e)))?;

        tracing::debug!(
            "Fetched {} forecast hours for location {}",
            parsed.hours.len(),
            location_id
        );
        Ok(parsed.hours)
    }
}
