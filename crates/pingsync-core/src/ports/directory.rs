//! User directory port (driven/secondary port)
//!
//! The interface the batch engine uses to look up, create, update and
//! delete user records in a remote identity directory.
//!
//! ## Design Notes
//!
//! - Errors are classified with [`DirectoryError`] rather than `anyhow`:
//!   the engine decides per kind whether a row is skipped, counted as an
//!   error, or aborts the job.
//! - A lookup with no match is `Ok(None)`, never an error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::newtypes::{AccessToken, RecordId};
use crate::domain::record::{EnvironmentDetails, RemoteRecord, UserAttributes};

// ============================================================================
// DirectoryError
// ============================================================================

/// Failure of a directory or token call, classified for the engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Input rejected before anything was sent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 429 responses exhausted the retry budget
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// 401/403 from the remote, or unusable credentials
    #[error("{0}")]
    InvalidCredentials(String),

    /// The record already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-success response
    #[error("API error {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A success response whose body could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DirectoryError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DirectoryError::InvalidCredentials(_))
    }
}

// ============================================================================
// DirectorySession
// ============================================================================

/// Environment and bearer token a directory call is made with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySession {
    pub environment_id: String,
    pub token: AccessToken,
}

impl DirectorySession {
    pub fn new(environment_id: impl Into<String>, token: AccessToken) -> Self {
        Self {
            environment_id: environment_id.into(),
            token,
        }
    }
}

// ============================================================================
// IUserDirectory
// ============================================================================

/// Per-user operations against the remote directory.
///
/// Implementations apply their own retry policy for rate limiting;
/// callers see `RateLimited` only once that policy is exhausted.
#[async_trait]
pub trait IUserDirectory: Send + Sync {
    /// Find the user with exactly this username
    async fn find_by_username(
        &self,
        session: &DirectorySession,
        username: &str,
    ) -> Result<Option<RemoteRecord>, DirectoryError>;

    /// Create a user; an existing username yields `Conflict`
    async fn create(
        &self,
        session: &DirectorySession,
        attributes: &UserAttributes,
    ) -> Result<RemoteRecord, DirectoryError>;

    /// Apply a partial update to an existing user
    async fn patch(
        &self,
        session: &DirectorySession,
        id: &RecordId,
        update: &Map<String, Value>,
    ) -> Result<(), DirectoryError>;

    async fn delete(&self, session: &DirectorySession, id: &RecordId)
        -> Result<(), DirectoryError>;

    /// Describe the session's environment
    async fn environment(
        &self,
        session: &DirectorySession,
    ) -> Result<EnvironmentDetails, DirectoryError>;
}
