//! Token and environment lookups

use serde_json::json;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_worker_token_returns_access_token() {
    let server = common::start().await;
    common::mount_token(&server.pingone).await;

    let response = server
        .post_json("/get-worker-token", &common::credentials_json())
        .await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"access_token": "test-access-token"}));
}

#[tokio::test]
async fn test_malformed_credentials_list_every_problem() {
    let server = common::start().await;

    let response = server
        .post_json(
            "/get-worker-token",
            &json!({"environmentId": "", "clientId": "client123", "clientSecret": "short"}),
        )
        .await;
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials format.");
    assert_eq!(
        body["details"],
        json!([
            "Environment ID is required",
            "Client Secret must be at least 8 characters long"
        ])
    );
}

#[tokio::test]
async fn test_rejected_credentials_are_401() {
    let server = common::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/as/token", common::ENV_ID)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
        .mount(&server.pingone)
        .await;

    let response = server
        .post_json("/get-worker-token", &common::credentials_json())
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_environment_details() {
    let server = common::start().await;
    common::mount_token(&server.pingone).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/environments/{}", common::ENV_ID)))
        .and(bearer_token("test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": common::ENV_ID,
            "name": "Staging",
            "type": "SANDBOX",
            "region": "NA"
        })))
        .expect(1)
        .mount(&server.pingone)
        .await;

    let response = server
        .post_json("/get-environment-details", &common::credentials_json())
        .await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], common::ENV_ID);
    assert_eq!(body["name"], "Staging");
    assert_eq!(body["type"], "SANDBOX");
}

#[tokio::test]
async fn test_auth_rate_limit() {
    let server = common::start_with(|config| config.limits.auth_requests_per_15min = 2).await;
    common::mount_token(&server.pingone).await;

    for _ in 0..2 {
        let response = server
            .post_json("/get-worker-token", &common::credentials_json())
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = server
        .post_json("/get-environment-details", &common::credentials_json())
        .await;
    assert_eq!(response.status(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Too many authentication attempts");
    assert!(body["retryAfter"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_invalid_json_body_is_400() {
    let server = common::start().await;
    let response = reqwest::Client::new()
        .post(server.url("/get-worker-token"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
