//! Per-client request limits
//!
//! Two keyed limiters guard the HTTP surface: one for job uploads and one
//! for the credential endpoints. Each admits a burst of `count` requests
//! per client IP and refills one slot every `window / count`.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use pingsync_core::config::LimitsConfig;
use tracing::warn;

use crate::http::ApiError;

const UPLOAD_WINDOW: Duration = Duration::from_secs(60 * 60);
const AUTH_WINDOW: Duration = Duration::from_secs(15 * 60);

/// One keyed limiter plus the message returned when it trips
pub struct ClientLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    clock: DefaultClock,
    message: &'static str,
}

impl ClientLimiter {
    /// Allow `count` requests per `window` from each client
    pub fn new(count: u32, window: Duration, message: &'static str) -> Self {
        let burst = NonZeroU32::new(count).unwrap_or(NonZeroU32::MIN);
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            message,
        }
    }

    /// Admit one request from `client` or report how long it must wait
    pub fn check(&self, client: IpAddr) -> Result<(), ApiError> {
        match self.limiter.check_key(&client) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let retry_after = not_until.wait_time_from(self.clock.now());
                warn!(%client, retry_after_secs = retry_after.as_secs(), "{}", self.message);
                Err(ApiError::RateLimited {
                    message: self.message,
                    retry_after,
                })
            }
        }
    }

    /// Forget clients whose quota has fully refilled
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }

    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

/// The server's inbound limits
pub struct RateLimits {
    pub uploads: ClientLimiter,
    pub auth: ClientLimiter,
}

impl RateLimits {
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self {
            uploads: ClientLimiter::new(
                limits.upload_requests_per_hour,
                UPLOAD_WINDOW,
                "Too many file uploads",
            ),
            auth: ClientLimiter::new(
                limits.auth_requests_per_15min,
                AUTH_WINDOW,
                "Too many authentication attempts",
            ),
        }
    }

    pub fn retain_recent(&self) {
        self.uploads.retain_recent();
        self.auth.retain_recent();
    }
}
