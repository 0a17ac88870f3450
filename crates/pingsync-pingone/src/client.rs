//! PingOne management API client
//!
//! Provides a typed HTTP client for the user endpoints of the PingOne
//! management API. Handles bearer headers, URL construction, filter
//! escaping, status classification and 429 backoff.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pingsync_core::domain::AccessToken;
//! use pingsync_core::ports::DirectorySession;
//! use pingsync_pingone::client::PingOneClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = PingOneClient::new();
//! let session = DirectorySession::new("env-id", AccessToken::new("token"));
//! if let Some(user) = client.find_user_by_username(&session, "alice").await? {
//!     println!("found {}", user.id);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use pingsync_core::{
    config::Config,
    domain::{EnvironmentDetails, RecordId, RemoteRecord, UserAttributes},
    ports::DirectorySession,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::retry::{send_with_retry, RetryPolicy};
use crate::PingOneError;

/// Default management API host
const API_BASE_URL: &str = "https://api.pingone.com";

/// Marker PingOne puts in 400 bodies for duplicate unique attributes
const UNIQUENESS_VIOLATION: &str = "UNIQUENESS_VIOLATION";

// ============================================================================
// API response types
// ============================================================================

/// Response from a filtered user search
#[derive(Debug, Deserialize)]
struct UserSearchResponse {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedUsers>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedUsers {
    #[serde(default)]
    users: Vec<RemoteRecord>,
}

// ============================================================================
// Filter escaping
// ============================================================================

/// Escape a value for use inside a double-quoted SCIM filter literal.
///
/// Backslash and double quote are backslash-escaped; control characters
/// cannot be expressed and are rejected.
pub fn escape_filter_value(value: &str) -> Result<String, PingOneError> {
    if value.chars().any(char::is_control) {
        return Err(PingOneError::InvalidFilter(
            "value contains control characters".to_string(),
        ));
    }
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Ok(escaped)
}

/// `username eq "<escaped>"`
pub fn username_filter(username: &str) -> Result<String, PingOneError> {
    Ok(format!("username eq \"{}\"", escape_filter_value(username)?))
}

// ============================================================================
// PingOneClient
// ============================================================================

/// HTTP client for PingOne user management calls
#[derive(Debug, Clone)]
pub struct PingOneClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
    /// Per-call timeout
    timeout: Duration,
    retry: RetryPolicy,
}

impl PingOneClient {
    /// Creates a client for the public PingOne API host
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL)
    }

    /// Creates a client with a custom base URL (regional hosts, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_base_url(&config.pingone.api_base_url)
            .with_timeout(config.http.api_timeout())
            .with_retry_policy(RetryPolicy::from_config(&config.http))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g. "/v1/environments/x/users")
    /// * `session` - Supplies the bearer token
    pub fn request(
        &self,
        method: Method,
        path: &str,
        session: &DirectorySession,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(session.token.secret())
    }

    fn users_path(session: &DirectorySession) -> String {
        format!("/v1/environments/{}/users", session.environment_id)
    }

    fn user_path(session: &DirectorySession, id: &RecordId) -> String {
        format!(
            "/v1/environments/{}/users/{}",
            session.environment_id,
            id.as_str()
        )
    }

    /// Sends with 429 backoff, then turns non-success statuses into errors
    async fn execute<F>(&self, label: &str, build: F) -> Result<Response, PingOneError>
    where
        F: Fn() -> RequestBuilder,
    {
        let response = send_with_retry(&self.retry, label, self.timeout, build).await?;
        check_status(response).await
    }

    /// Looks up a user by exact username
    ///
    /// # Returns
    /// The first match, or `None` when the search is empty
    pub async fn find_user_by_username(
        &self,
        session: &DirectorySession,
        username: &str,
    ) -> Result<Option<RemoteRecord>, PingOneError> {
        let filter = username_filter(username)?;
        let path = Self::users_path(session);
        debug!(username, "Searching user by username");

        let response = self
            .execute("find_user", || {
                self.request(Method::GET, &path, session)
                    .query(&[("filter", filter.as_str())])
            })
            .await?;

        let page: UserSearchResponse = response
            .json()
            .await
            .map_err(|e| PingOneError::InvalidResponse(format!("user search: {e}")))?;

        Ok(page
            .embedded
            .and_then(|e| e.users.into_iter().next()))
    }

    /// Creates a user
    pub async fn create_user(
        &self,
        session: &DirectorySession,
        attributes: &UserAttributes,
    ) -> Result<RemoteRecord, PingOneError> {
        let path = Self::users_path(session);
        let response = self
            .execute("create_user", || {
                self.request(Method::POST, &path, session).json(attributes)
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| PingOneError::InvalidResponse(format!("create user: {e}")))
    }

    /// Applies a partial update to a user
    pub async fn update_user(
        &self,
        session: &DirectorySession,
        id: &RecordId,
        update: &Map<String, Value>,
    ) -> Result<(), PingOneError> {
        let path = Self::user_path(session, id);
        self.execute("update_user", || {
            self.request(Method::PATCH, &path, session).json(update)
        })
        .await?;
        Ok(())
    }

    /// Deletes a user
    pub async fn delete_user(
        &self,
        session: &DirectorySession,
        id: &RecordId,
    ) -> Result<(), PingOneError> {
        let path = Self::user_path(session, id);
        self.execute("delete_user", || {
            self.request(Method::DELETE, &path, session)
        })
        .await?;
        Ok(())
    }

    /// Retrieves the session's environment description
    pub async fn get_environment(
        &self,
        session: &DirectorySession,
    ) -> Result<EnvironmentDetails, PingOneError> {
        let path = format!("/v1/environments/{}", session.environment_id);
        let response = self
            .execute("get_environment", || {
                self.request(Method::GET, &path, session)
            })
            .await?;

        response
            .json()
            .await
            .map_err(|e| PingOneError::InvalidResponse(format!("environment: {e}")))
    }
}

impl Default for PingOneClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map non-success statuses to typed errors, keeping the body text
async fn check_status(response: Response) -> Result<Response, PingOneError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

fn classify_status(status: StatusCode, body: String) -> PingOneError {
    match status {
        StatusCode::UNAUTHORIZED => PingOneError::Unauthorized(body),
        StatusCode::FORBIDDEN => PingOneError::Forbidden(body),
        StatusCode::NOT_FOUND => PingOneError::NotFound(body),
        StatusCode::CONFLICT => PingOneError::Conflict(body),
        StatusCode::BAD_REQUEST if body.contains(UNIQUENESS_VIOLATION) => {
            PingOneError::Conflict(body)
        }
        other => PingOneError::Api {
            status: other.as_u16(),
            body,
        },
    }
}
