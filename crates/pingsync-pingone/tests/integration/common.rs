//! Shared test helpers for PingOne integration tests
//!
//! Each helper starts a wiremock server and returns a client pointing at it.
//! Retry backoff is shortened so retry paths run quickly; tests that check
//! the real schedule build their own policy.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pingsync_core::domain::{AccessToken, Credentials};
use pingsync_core::ports::DirectorySession;
use pingsync_pingone::auth::ClientCredentialsFlow;
use pingsync_pingone::client::PingOneClient;
use pingsync_pingone::retry::RetryPolicy;
use pingsync_pingone::token_cache::TokenCache;

pub const ENV_ID: &str = "env12345";

/// Backoff used by most tests: 10ms, 20ms, 40ms
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10))
}

pub fn test_credentials() -> Credentials {
    Credentials::new(ENV_ID, "client123", "secret123")
}

pub fn test_session() -> DirectorySession {
    DirectorySession::new(ENV_ID, AccessToken::new("test-access-token"))
}

/// Path of the token endpoint for [`ENV_ID`]
pub fn token_path() -> String {
    format!("/{ENV_ID}/as/token")
}

pub fn users_path() -> String {
    format!("/v1/environments/{ENV_ID}/users")
}

/// Starts a mock server and a management API client pointing at it
pub async fn setup_api_mock() -> (MockServer, PingOneClient) {
    let server = MockServer::start().await;
    let client = PingOneClient::with_base_url(server.uri()).with_retry_policy(fast_retry());
    (server, client)
}

/// Starts a mock server and a token cache pointing at it
pub async fn setup_token_mock() -> (MockServer, TokenCache) {
    let server = MockServer::start().await;
    let flow = ClientCredentialsFlow::new(server.uri(), "p1:admin:user:read")
        .with_retry_policy(fast_retry());
    let cache = TokenCache::new(flow).with_min_fetch_interval(Duration::ZERO);
    (server, cache)
}

/// Mounts a token endpoint that always succeeds with `token`
pub async fn mount_token(server: &MockServer, token: &str, expires_in: u64, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn user_json(id: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "name": {"given": "Test", "family": "User"},
        "population": {"id": "pop-1"}
    })
}
