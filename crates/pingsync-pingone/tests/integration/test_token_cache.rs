//! Token endpoint and cache behavior

use std::time::Duration;

use pingsync_core::domain::AccessToken;
use pingsync_pingone::PingOneError;
use wiremock::{
    matchers::{basic_auth, body_string_contains, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_token_request_shape() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .and(basic_auth("client123", "secret123"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=p1%3Aadmin%3Auser%3Aread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = cache
        .get_token(&common::test_credentials())
        .await
        .expect("token");
    assert_eq!(token.secret(), "tok-1");
}

#[tokio::test]
async fn test_concurrent_cold_gets_share_one_fetch() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "shared", "expires_in": 3600}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let creds = common::test_credentials();
    let (a, b) = tokio::join!(cache.get_token(&creds), cache.get_token(&creds));

    assert_eq!(a.unwrap().secret(), "shared");
    assert_eq!(b.unwrap().secret(), "shared");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let (server, cache) = common::setup_token_mock().await;
    common::mount_token(&server, "tok", 3600, 1).await;

    let creds = common::test_credentials();
    for _ in 0..3 {
        assert_eq!(cache.get_token(&creds).await.unwrap().secret(), "tok");
    }
}

#[tokio::test]
async fn test_token_within_safety_margin_is_refetched() {
    let (server, cache) = common::setup_token_mock().await;
    // expires_in equal to the 60s margin leaves no usable lifetime
    common::mount_token(&server, "short", 60, 2).await;

    let creds = common::test_credentials();
    cache.get_token(&creds).await.unwrap();
    cache.get_token(&creds).await.unwrap();
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let (server, cache) = common::setup_token_mock().await;
    common::mount_token(&server, "tok", 3600, 2).await;

    let creds = common::test_credentials();
    let token = cache.get_token(&creds).await.unwrap();
    cache.invalidate(&creds, &token).await;
    cache.get_token(&creds).await.unwrap();
}

#[tokio::test]
async fn test_stale_rejection_keeps_fresh_token() {
    let (server, cache) = common::setup_token_mock().await;
    common::mount_token(&server, "fresh", 3600, 1).await;

    let creds = common::test_credentials();
    let fresh = cache.get_token(&creds).await.unwrap();
    cache.invalidate(&creds, &AccessToken::new("stale")).await;

    assert_eq!(cache.get_token(&creds).await.unwrap(), fresh);
}

#[tokio::test]
async fn test_distinct_credentials_get_distinct_entries() {
    let (server, cache) = common::setup_token_mock().await;
    common::mount_token(&server, "tok", 3600, 2).await;

    let mut other = common::test_credentials();
    other.client_secret = "another-secret".into();

    cache.get_token(&common::test_credentials()).await.unwrap();
    cache.get_token(&other).await.unwrap();
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_rejected_credentials_are_not_cached() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(2)
        .mount(&server)
        .await;

    let creds = common::test_credentials();
    for _ in 0..2 {
        let err = cache.get_token(&creds).await.unwrap_err();
        match err {
            PingOneError::Unauthorized(msg) => assert_eq!(
                msg,
                "Invalid credentials. Please check your Client ID and Client Secret."
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_unknown_environment_is_an_auth_failure() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = cache
        .get_token(&common::test_credentials())
        .await
        .unwrap_err();
    assert!(
        matches!(err, PingOneError::Unauthorized(ref m) if m.starts_with("Environment not found")),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_missing_access_token_is_invalid_response() {
    let (server, cache) = common::setup_token_mock().await;

    Mock::given(method("POST"))
        .and(path(common::token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let err = cache
        .get_token(&common::test_credentials())
        .await
        .unwrap_err();
    assert!(matches!(err, PingOneError::InvalidResponse(_)), "{err:?}");
    assert_eq!(cache.purge_expired(), 1);
}

#[tokio::test]
async fn test_token_fetches_are_spaced() {
    let (server, cache) = common::setup_token_mock().await;
    let cache = cache.with_min_fetch_interval(Duration::from_millis(300));
    common::mount_token(&server, "tok", 3600, 2).await;

    let mut other = common::test_credentials();
    other.client_id = "client456".into();

    let start = std::time::Instant::now();
    cache.get_token(&common::test_credentials()).await.unwrap();
    cache.get_token(&other).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
}
