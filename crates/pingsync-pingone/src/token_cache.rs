//! Access token cache
//!
//! At most one live token per credentials triple, keyed by
//! [`Credentials::cache_key`]. Each key owns an async mutex so that
//! concurrent callers on a cold or expired entry share a single fetch.
//! Token fetches across the whole cache are spaced by a minimum interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use pingsync_core::{config::Config, domain::credentials::Credentials, domain::AccessToken};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::ClientCredentialsFlow;
use crate::PingOneError;

/// A token held by the cache
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: AccessToken,
    pub obtained_at: Instant,
    pub expires_at: Instant,
}

impl CachedToken {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type Slot = Arc<Mutex<Option<CachedToken>>>;

/// Per-credentials token cache in front of a [`ClientCredentialsFlow`]
pub struct TokenCache {
    flow: ClientCredentialsFlow,
    entries: DashMap<String, Slot>,
    safety_margin: Duration,
    min_fetch_interval: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl TokenCache {
    pub fn new(flow: ClientCredentialsFlow) -> Self {
        Self {
            flow,
            entries: DashMap::new(),
            safety_margin: Duration::from_secs(60),
            min_fetch_interval: Duration::from_millis(100),
            last_fetch: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ClientCredentialsFlow::from_config(config))
            .with_safety_margin(config.token_cache.safety_margin())
            .with_min_fetch_interval(config.token_cache.min_fetch_interval())
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_min_fetch_interval(mut self, interval: Duration) -> Self {
        self.min_fetch_interval = interval;
        self
    }

    /// Return the cached token for `credentials`, fetching one if needed.
    ///
    /// A failed fetch leaves nothing cached.
    pub async fn get_token(&self, credentials: &Credentials) -> Result<AccessToken, PingOneError> {
        let slot = self.slot(&credentials.cache_key());
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_valid_at(Instant::now()) {
                return Ok(cached.token.clone());
            }
            debug!("Cached token expired");
        }
        *entry = None;

        self.throttle().await;
        let issued = self.flow.fetch_token(credentials).await?;

        let obtained_at = Instant::now();
        let lifetime = issued.expires_in.saturating_sub(self.safety_margin);
        *entry = Some(CachedToken {
            token: issued.access_token.clone(),
            obtained_at,
            expires_at: obtained_at + lifetime,
        });
        Ok(issued.access_token)
    }

    /// Drop the token cached for `credentials` if it is `rejected`.
    ///
    /// A slot already holding a newer token is kept, so a stale rejection
    /// from one job does not discard a token another job just fetched.
    pub async fn invalidate(&self, credentials: &Credentials, rejected: &AccessToken) {
        let key = credentials.cache_key();
        let slot = self.entries.get(&key).map(|e| Arc::clone(e.value()));
        let Some(slot) = slot else {
            return;
        };

        let mut entry = slot.lock().await;
        if entry.as_ref().is_some_and(|cached| &cached.token == rejected) {
            *entry = None;
            info!("Invalidated cached access token");
        } else {
            debug!("Rejected token already replaced");
        }
    }

    /// Remove entries whose token is expired or missing and not in use.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|e| match e.value().try_lock() {
                Ok(guard) => !guard.as_ref().is_some_and(|t| t.is_valid_at(now)),
                Err(_) => false,
            })
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in stale {
            if self
                .entries
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1)
                .is_some()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Purged expired token cache entries");
        }
        removed
    }

    /// Number of credential keys currently tracked
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&self, key: &str) -> Slot {
        Arc::clone(self.entries.entry(key.to_string()).or_default().value())
    }

    /// Space token fetches by at least `min_fetch_interval`
    async fn throttle(&self) {
        let mut last = self.last_fetch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_fetch_interval {
                tokio::time::sleep(self.min_fetch_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    #[cfg(test)]
    fn seed(&self, credentials: &Credentials, token: CachedToken) {
        self.entries
            .insert(credentials.cache_key(), Arc::new(Mutex::new(Some(token))));
    }
}
