//! 429 backoff against the mock server

use std::time::{Duration, Instant};

use pingsync_core::config::HttpConfig;
use pingsync_pingone::client::PingOneClient;
use pingsync_pingone::retry::RetryPolicy;
use pingsync_pingone::PingOneError;
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common;

async fn mount_empty_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_two_429s_then_success_waits_one_plus_two_seconds() {
    let server = MockServer::start().await;
    let client =
        PingOneClient::with_base_url(server.uri()).with_retry_policy(RetryPolicy::default());

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_empty_search(&server).await;

    let start = Instant::now();
    let found = client
        .find_user_by_username(&common::test_session(), "alice")
        .await
        .unwrap();

    assert!(found.is_none());
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_persistent_429_exhausts_budget() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = client
        .find_user_by_username(&common::test_session(), "alice")
        .await
        .unwrap_err();
    assert!(
        matches!(err, PingOneError::TooManyRequests { attempts: 4 }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_retry_after_header_extends_backoff() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_empty_search(&server).await;

    let start = Instant::now();
    client
        .find_user_by_username(&common::test_session(), "alice")
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_long_retry_after_is_clamped_to_configured_ceiling() {
    let server = MockServer::start().await;
    let http = HttpConfig {
        backoff_base_ms: 10,
        max_retry_after_secs: 1,
        ..HttpConfig::default()
    };
    let client = PingOneClient::with_base_url(server.uri())
        .with_retry_policy(RetryPolicy::from_config(&http));

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_empty_search(&server).await;

    let start = Instant::now();
    let found = tokio::time::timeout(
        Duration::from_secs(10),
        client.find_user_by_username(&common::test_session(), "alice"),
    )
    .await
    .expect("Retry-After should be clamped")
    .unwrap();

    assert!(found.is_none());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let (server, client) = common::setup_api_mock().await;
    let client = client.with_timeout(Duration::from_millis(100));

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"count": 0}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .find_user_by_username(&common::test_session(), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, PingOneError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn test_token_endpoint_shares_backoff() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_token(&server, "after-backoff", 3600, 1).await;

    let token = cache
        .get_token(&common::test_credentials())
        .await
        .unwrap();
    assert_eq!(token.secret(), "after-backoff");
}
