//! Client-credentials token acquisition
//!
//! `POST {auth_base_url}/{environmentId}/as/token` with a form body of
//! `grant_type=client_credentials&scope=...` and HTTP Basic authentication.
//!
//! ## Components
//!
//! - [`ClientCredentialsFlow`] - Performs the token request with 429 backoff
//! - [`IssuedToken`] - A freshly issued token and its lifetime

use std::time::Duration;

use pingsync_core::{config::Config, domain::credentials::Credentials, domain::AccessToken};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::retry::{send_with_retry, RetryPolicy};
use crate::PingOneError;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// A token as issued by the token endpoint
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: AccessToken,
    pub expires_in: Duration,
}

// ============================================================================
// ClientCredentialsFlow
// ============================================================================

/// OAuth2 client-credentials grant against a PingOne environment
#[derive(Debug, Clone)]
pub struct ClientCredentialsFlow {
    client: Client,
    auth_base_url: String,
    scopes: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClientCredentialsFlow {
    pub fn new(auth_base_url: impl Into<String>, scopes: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            auth_base_url: auth_base_url.into().trim_end_matches('/').to_string(),
            scopes: scopes.into(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.pingone.auth_base_url, &config.pingone.scopes)
            .with_timeout(config.http.token_timeout())
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

    /// Token endpoint URL for an environment
    pub fn token_url(&self, environment_id: &str) -> String {
        format!("{}/{}/as/token", self.auth_base_url, environment_id)
    }

    /// Request a new access token.
    ///
    /// # Errors
    /// - `Unauthorized` / `Forbidden` for rejected credentials, and
    ///   `Unauthorized` for an unknown environment (404)
    /// - `TooManyRequests` once the 429 budget is spent
    /// - `InvalidResponse` when a success body carries no `access_token`
    pub async fn fetch_token(
        &self,
        credentials: &Credentials,
    ) -> Result<IssuedToken, PingOneError> {
        let url = self.token_url(&credentials.environment_id);
        debug!(environment_id = %credentials.environment_id, "Requesting client-credentials token");

        let form = [
            ("grant_type", "client_credentials"),
            ("scope", self.scopes.as_str()),
        ];
        let response = send_with_retry(&self.retry, "token", self.timeout, || {
            self.client
                .post(&url)
                .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
                .form(&form)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token request rejected");
            return Err(token_error(status, body));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PingOneError::InvalidResponse(format!("token response: {e}")))?;

        let token = body.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            PingOneError::InvalidResponse("No access token received from PingOne".to_string())
        })?;
        let expires_in = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_EXPIRES_IN);

        info!(
            environment_id = %credentials.environment_id,
            expires_in_secs = expires_in.as_secs(),
            "Obtained access token"
        );

        Ok(IssuedToken {
            access_token: AccessToken::new(token),
            expires_in,
        })
    }
}

/// Map a non-success token endpoint status to a user-facing error
fn token_error(status: StatusCode, body: String) -> PingOneError {
    match status {
        StatusCode::UNAUTHORIZED => PingOneError::Unauthorized(
            "Invalid credentials. Please check your Client ID and Client Secret.".to_string(),
        ),
        StatusCode::FORBIDDEN => PingOneError::Forbidden(
            "Access denied. Please check your application permissions.".to_string(),
        ),
        StatusCode::NOT_FOUND => PingOneError::Unauthorized(
            "Environment not found. Please check your Environment ID.".to_string(),
        ),
        other => PingOneError::Api {
            status: other.as_u16(),
            body,
        },
    }
}
