//! Exponential backoff for forecast requests and capture cycles.
//!
//! Forecast requests are retried on timeouts, connection failures, 5xx, 429
//! and 408. Anything else, including other 4xx, goes straight back to the
//! caller. The capture trigger reuses [`RetryConfig`] to space out whole-cycle
//! retries.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry budget and backoff curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after it
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Wait before retry number `retry` (0-based), capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Statuses worth asking again for.
fn transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Whether an attempt's outcome is worth retrying.
fn is_transient(outcome: &Result<Response, reqwest::Error>) -> bool {
    match outcome {
        Ok(response) => transient_status(response.status()),
        Err(e) if e.is_timeout() || e.is_connect() => true,
        Err(e) => e.status().is_some_and(transient_status),
    }
}

/// Run `operation` until it yields a non-transient outcome or the budget runs
/// out. The final outcome is returned as-is, so an exhausted 503 comes back as
/// an `Ok` response for the caller to classify.
pub async fn with_retry<F, Fut>(config: RetryConfig, operation: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut retry: u32 = 0;

    loop {
        let outcome = operation().await;

        if retry >= config.max_retries || !is_transient(&outcome) {
            if retry > 0 {
                tracing::debug!("Forecast request settled after {} retries", retry);
            }
            return outcome;
        }

        let delay = config.delay_for_attempt(retry);
        match &outcome {
            Ok(response) => tracing::warn!(
                "Forecast request returned {}, retry {} of {} in {:?}",
                response.status(),
                retry + 1,
                config.max_retries,
                delay
            ),
            Err(e) => tracing::warn!(
                "Forecast request failed ({}), retry {} of {} in {:?}",
                e,
                retry + 1,
                config.max_retries,
                delay
            ),
        }

        tokio::time::sleep(delay).await;
        retry += 1;
    }
}
