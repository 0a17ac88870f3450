//! Configuration module for pingsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for pingsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pingone: PingOneConfig,
    pub http: HttpConfig,
    pub token_cache: TokenCacheConfig,
    pub engine: EngineConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the `serve` command binds to.
    pub bind: String,
}

/// Identity platform endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PingOneConfig {
    /// Base URL of the token endpoint host (`{auth_base_url}/{envId}/as/token`).
    pub auth_base_url: String,
    /// Base URL of the management API (`{api_base_url}/v1/environments/...`).
    pub api_base_url: String,
    /// Space separated scopes requested with client credentials.
    pub scopes: String,
}

/// Outbound HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub token_timeout_secs: u64,
    pub api_timeout_secs: u64,
    /// Retries after the first attempt when the remote answers 429.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub backoff_base_ms: u64,
    /// Ceiling applied to a `Retry-After` header before it can stretch a backoff.
    pub max_retry_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenCacheConfig {
    /// Subtracted from `expires_in` when computing the cached expiry.
    pub safety_margin_secs: u64,
    /// Minimum spacing between two token fetches across the whole cache.
    pub min_fetch_interval_ms: u64,
    /// Interval of the background sweep that drops expired entries.
    pub sweep_interval_secs: u64,
}

/// Batch loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inter_row_delay_ms: u64,
    /// A progress frame is written after this many rows.
    pub progress_every: usize,
    /// Capacity of the frame channel behind a streaming response.
    pub channel_capacity: usize,
}

/// Request and job limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_rows: usize,
    pub max_upload_bytes: usize,
    pub upload_requests_per_hour: u32,
    pub auth_requests_per_15min: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/pingsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pingsync")
            .join("config.yaml")
    }

    /// Apply `PINGSYNC_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup, used by [`Config::apply_env_overrides`].
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("PINGSYNC_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = lookup("PINGSYNC_AUTH_BASE_URL") {
            self.pingone.auth_base_url = url;
        }
        if let Some(url) = lookup("PINGSYNC_API_BASE_URL") {
            self.pingone.api_base_url = url;
        }
        if let Some(rows) = lookup("PINGSYNC_MAX_ROWS").and_then(|v| v.parse().ok()) {
            self.limits.max_rows = rows;
        }
        if let Some(level) = lookup("PINGSYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
        }
    }
}

impl Default for PingOneConfig {
    fn default() -> Self {
        Self {
            auth_base_url: "https://auth.pingone.com".to_string(),
            api_base_url: "https://api.pingone.com".to_string(),
            scopes: "p1:admin:user:read p1:admin:user:write".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            token_timeout_secs: 10,
            api_timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 1000,
            max_retry_after_secs: 8,
        }
    }
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: 60,
            min_fetch_interval_ms: 100,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inter_row_delay_ms: 200,
            progress_every: 5,
            channel_capacity: 16,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            max_upload_bytes: 10 * 1024 * 1024,
            upload_requests_per_hour: 10,
            auth_requests_per_15min: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Duration accessors
// ---------------------------------------------------------------------------

impl HttpConfig {
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

impl TokenCacheConfig {
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    pub fn min_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.min_fetch_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl EngineConfig {
    pub fn inter_row_delay(&self) -> Duration {
        Duration::from_millis(self.inter_row_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"engine.progress_every"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

fn must_be_http_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        Ok(parsed) => errors.push(ValidationError {
            field: field.into(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field: field.into(),
            message: format!("invalid URL '{value}': {e}"),
        }),
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        if self.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.bind".into(),
                message: format!("'{}' is not a socket address", self.server.bind),
            });
        }

        // --- pingone ---
        must_be_http_url(&mut errors, "pingone.auth_base_url", &self.pingone.auth_base_url);
        must_be_http_url(&mut errors, "pingone.api_base_url", &self.pingone.api_base_url);
        if self.pingone.scopes.trim().is_empty() {
            errors.push(ValidationError {
                field: "pingone.scopes".into(),
                message: "must not be empty".into(),
            });
        }

        // --- http ---
        must_be_positive(&mut errors, "http.token_timeout_secs", self.http.token_timeout_secs);
        must_be_positive(&mut errors, "http.api_timeout_secs", self.http.api_timeout_secs);
        if self.http.max_retries > 10 {
            errors.push(ValidationError {
                field: "http.max_retries".into(),
                message: "must be in range 0..=10".into(),
            });
        }
        if self.http.max_retry_after_secs > 60 {
            errors.push(ValidationError {
                field: "http.max_retry_after_secs".into(),
                message: "must be in range 0..=60".into(),
            });
        }

        // --- token_cache ---
        must_be_positive(
            &mut errors,
            "token_cache.sweep_interval_secs",
            self.token_cache.sweep_interval_secs,
        );

        // --- engine ---
        must_be_positive(
            &mut errors,
            "engine.progress_every",
            self.engine.progress_every as u64,
        );
        must_be_positive(
            &mut errors,
            "engine.channel_capacity",
            self.engine.channel_capacity as u64,
        );

        // --- limits ---
        must_be_positive(&mut errors, "limits.max_rows", self.limits.max_rows as u64);
        must_be_positive(
            &mut errors,
            "limits.max_upload_bytes",
            self.limits.max_upload_bytes as u64,
        );
        must_be_positive(
            &mut errors,
            "limits.upload_requests_per_hour",
            u64::from(self.limits.upload_requests_per_hour),
        );
        must_be_positive(
            &mut errors,
            "limits.auth_requests_per_15min",
            u64::from(self.limits.auth_requests_per_15min),
        );

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use pingsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_bind("0.0.0.0:8080")
///     .engine_inter_row_delay_ms(0)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn server_bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    pub fn pingone_auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.pingone.auth_base_url = url.into();
        self
    }

    pub fn pingone_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.pingone.api_base_url = url.into();
        self
    }

    pub fn pingone_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.config.pingone.scopes = scopes.into();
        self
    }

    pub fn http_max_retries(mut self, n: u32) -> Self {
        self.config.http.max_retries = n;
        self
    }

    pub fn http_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.http.backoff_base_ms = ms;
        self
    }

    pub fn http_max_retry_after_secs(mut self, secs: u64) -> Self {
        self.config.http.max_retry_after_secs = secs;
        self
    }

    pub fn http_api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.api_timeout_secs = secs;
        self
    }

    pub fn token_cache_safety_margin_secs(mut self, secs: u64) -> Self {
        self.config.token_cache.safety_margin_secs = secs;
        self
    }

    pub fn token_cache_min_fetch_interval_ms(mut self, ms: u64) -> Self {
        self.config.token_cache.min_fetch_interval_ms = ms;
        self
    }

    pub fn engine_inter_row_delay_ms(mut self, ms: u64) -> Self {
        self.config.engine.inter_row_delay_ms = ms;
        self
    }

    pub fn engine_progress_every(mut self, n: usize) -> Self {
        self.config.engine.progress_every = n;
        self
    }

    pub fn limits_max_rows(mut self, n: usize) -> Self {
        self.config.limits.max_rows = n;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
