//! 429 handling shared by the token endpoint and the management API
//!
//! Every outbound call goes through [`send_with_retry`]: a request answered
//! with HTTP 429 is re-sent after an exponential backoff (base, 2x base,
//! 4x base, ...) until the retry budget is spent. When the response carries
//! a `Retry-After` header the wait is the larger of the two, with the header
//! clamped to `http.max_retry_after_secs`.

use std::time::Duration;

use pingsync_core::config::HttpConfig;
use reqwest::{header::RETRY_AFTER, RequestBuilder, Response, StatusCode};
use tracing::{info, warn};

use crate::PingOneError;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Exponential backoff schedule for 429 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
    /// Largest wait a `Retry-After` header may ask for
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_retry_after: Duration::from_secs(8),
        }
    }

    pub fn from_config(http: &HttpConfig) -> Self {
        Self::new(http.max_retries, http.backoff_base())
            .with_max_retry_after(http.max_retry_after())
    }

    pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
        self.max_retry_after = ceiling;
        self
    }

    /// Scheduled backoff before retry number `attempt + 1`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Actual wait: the scheduled backoff, stretched to honor `Retry-After`
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let scheduled = self.backoff(attempt);
        match retry_after {
            Some(hint) => scheduled.max(hint.min(self.max_retry_after)),
            None => scheduled,
        }
    }
}

// ============================================================================
// Retry-After header parsing
// ============================================================================

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT") - parsed as seconds from now
///
/// Returns `None` when the value is neither.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        let secs = (target - now).num_seconds().max(0);
        return u64::try_from(secs).ok().map(Duration::from_secs);
    }

    warn!(value, "Could not parse Retry-After header");
    None
}

// ============================================================================
// send_with_retry
// ============================================================================

/// Sends the request produced by `build`, retrying on 429.
///
/// `build` is called once per attempt, since a `RequestBuilder` is consumed
/// by `send`. Each attempt is bounded by `timeout`; timeouts and other
/// transport failures are returned immediately, not retried.
///
/// # Returns
/// The first non-429 response (of any status), or
/// [`PingOneError::TooManyRequests`] once the budget is exhausted.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    label: &str,
    timeout: Duration,
    build: F,
) -> Result<Response, PingOneError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let response = build()
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PingOneError::from_transport(e, timeout))?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            if attempt > 0 {
                info!(label, attempt, "Request succeeded after retry");
            }
            return Ok(response);
        }

        if attempt >= policy.max_retries {
            warn!(label, attempts = attempt + 1, "429 retry limit exhausted");
            return Err(PingOneError::TooManyRequests {
                attempts: attempt + 1,
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let delay = policy.delay_for(attempt, retry_after);

        info!(
            label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Received 429, backing off"
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
