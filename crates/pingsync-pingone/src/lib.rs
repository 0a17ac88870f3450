//! pingsync PingOne - identity platform adapter
//!
//! Provides async clients for:
//! - Client-credentials token acquisition
//! - A per-credential token cache with expiry and single-flight refresh
//! - User lookup, create, patch and delete against the management API
//! - 429 backoff shared by every outbound call
//!
//! ## Modules
//!
//! - [`auth`] - Client-credentials token endpoint
//! - [`token_cache`] - Cached tokens keyed by credentials digest
//! - [`client`] - Management API HTTP client
//! - [`provider`] - Port adapters for the batch engine
//! - [`retry`] - Backoff policy and `Retry-After` handling

pub mod auth;
pub mod client;
pub mod provider;
pub mod retry;
pub mod token_cache;

use std::time::Duration;

use pingsync_core::ports::DirectoryError;
use thiserror::Error;

/// Errors that can occur when communicating with PingOne
#[derive(Debug, Error)]
pub enum PingOneError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record already exists (409, or a 400 uniqueness violation)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Every attempt was answered with 429
    #[error("Too many requests: retry limit exhausted after {attempts} attempts")]
    TooManyRequests {
        /// Number of requests sent, including the first
        attempts: u32,
    },

    /// Any other non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(reqwest::Error),

    /// No response within the per-call timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A filter value that cannot be expressed safely
    #[error("Invalid filter value: {0}")]
    InvalidFilter(String),
}

impl PingOneError {
    /// Classify a transport failure of a request sent with `timeout`
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            PingOneError::Timeout(timeout)
        } else {
            PingOneError::NetworkError(err)
        }
    }
}

impl From<PingOneError> for DirectoryError {
    fn from(err: PingOneError) -> Self {
        match err {
            PingOneError::Unauthorized(msg) | PingOneError::Forbidden(msg) => {
                DirectoryError::InvalidCredentials(msg)
            }
            PingOneError::NotFound(body) => DirectoryError::RemoteApi { status: 404, body },
            PingOneError::Conflict(msg) => DirectoryError::Conflict(msg),
            PingOneError::TooManyRequests { attempts } => DirectoryError::RateLimited { attempts },
            PingOneError::Api { status, body } => DirectoryError::RemoteApi { status, body },
            PingOneError::NetworkError(e) => DirectoryError::Network(e.to_string()),
            PingOneError::Timeout(after) => DirectoryError::Timeout(after),
            PingOneError::InvalidResponse(msg) => DirectoryError::InvalidResponse(msg),
            PingOneError::InvalidFilter(msg) => DirectoryError::Validation(msg),
        }
    }
}
