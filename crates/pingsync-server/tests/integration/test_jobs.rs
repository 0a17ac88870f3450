//! Upload routes: streaming, validation, cancellation and limits

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_import_streams_progress_to_completion() {
    let server = common::start().await;
    common::mount_token(&server.pingone).await;
    common::mount_empty_search(&server.pingone).await;
    common::mount_create(&server.pingone).await;

    let response = server
        .upload(
            "/import-users",
            "users.csv",
            &common::csv_rows(&["alice", "bob"]),
            &[],
        )
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/x-ndjson");
    assert_eq!(response.headers()["cache-control"], "no-cache");
    let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();

    let frames = common::frames(response).await;
    assert_eq!(frames[0]["progress"], "started");
    assert_eq!(frames[0]["jobId"], job_id.as_str());
    assert_eq!(frames[0]["total"], 2);

    let last = frames.last().unwrap();
    assert_eq!(last["progress"], "complete");
    assert_eq!(last["added"], 2);
    assert_eq!(last["errors"], 0);
    assert_eq!(last["cancelled"], false);

    // Finished jobs leave the registry
    assert_eq!(server.post(&format!("/cancel/{job_id}")).await.status(), 404);
}

#[tokio::test]
async fn test_missing_required_field_is_a_single_error_frame() {
    let server = common::start().await;

    let csv = format!(
        "{}\nalice,alice@example.com,A,S,pop-1\nbob,,B,J,pop-1\n",
        common::CSV_HEADER
    );
    let response = server.upload("/import-users", "users.csv", &csv, &[]).await;
    assert_eq!(response.status(), 200);

    let frames = common::frames(response).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["error"], "Missing required fields.");
    assert_eq!(
        frames[0]["details"],
        json!(["Row 2 missing required fields: email"])
    );
}

#[tokio::test]
async fn test_delete_unknown_user_counts_not_found() {
    let server = common::start().await;
    common::mount_token(&server.pingone).await;
    common::mount_empty_search(&server.pingone).await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/v1/environments/.+/users/.+$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server.pingone)
        .await;

    let response = server
        .upload("/delete-users", "users.csv", "username\nghost\n", &[])
        .await;
    let frames = common::frames(response).await;

    let last = frames.last().unwrap();
    assert_eq!(last["progress"], "complete");
    assert_eq!(last["deleted"], 0);
    assert_eq!(last["notFound"], 1);
}

#[tokio::test]
async fn test_modify_changed_only_patches_differences() {
    let server = common::start().await;
    common::mount_token(&server.pingone).await;
    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"users": [{
                "id": "u-1",
                "username": "alice",
                "email": "alice@example.com",
                "name": {"given": "Alice", "family": "Smith"}
            }]}
        })))
        .mount(&server.pingone)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/u-1", common::users_path())))
        .and(wiremock::matchers::body_json(json!({"name": {"given": "Alicia"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u-1"})))
        .expect(1)
        .mount(&server.pingone)
        .await;

    let response = server
        .upload(
            "/import-users",
            "users.csv",
            "username,email,firstName,lastName\nalice,alice@example.com,Alicia,Smith\n",
            &[("mode", "modify"), ("modifyMode", "changed-only")],
        )
        .await;
    let frames = common::frames(response).await;

    let last = frames.last().unwrap();
    assert_eq!(last["progress"], "complete");
    assert_eq!(last["modified"], 1);
}

#[tokio::test]
async fn test_non_csv_upload_is_rejected() {
    let server = common::start().await;

    let response = server
        .upload("/import-users", "users.txt", &common::csv_rows(&["alice"]), &[])
        .await;
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid file type. Allowed types: .csv");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = common::start_with(|config| config.limits.max_upload_bytes = 256).await;

    let names: Vec<String> = (0..20).map(|i| format!("user{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let response = server
        .upload("/import-users", "users.csv", &common::csv_rows(&names), &[])
        .await;
    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn test_cancel_stops_a_running_job() {
    let server = common::start_with(|config| config.engine.inter_row_delay_ms = 200).await;
    common::mount_token(&server.pingone).await;
    common::mount_empty_search(&server.pingone).await;
    common::mount_create(&server.pingone).await;

    let names: Vec<String> = (0..10).map(|i| format!("user{i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let response = server
        .upload("/import-users", "users.csv", &common::csv_rows(&names), &[])
        .await;
    let job_id = response.headers()["x-job-id"].to_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let cancel = server.post(&format!("/cancel/{job_id}")).await;
    assert_eq!(cancel.status(), 200);
    let body: serde_json::Value = cancel.json().await.unwrap();
    assert_eq!(body, json!({"cancelled": true, "jobId": job_id}));

    let frames = common::frames(response).await;
    let last = frames.last().unwrap();
    assert_eq!(last["progress"], "cancelled");
    assert_eq!(last["total"], 10);
    let processed = last["processed"].as_u64().unwrap();
    assert!(processed < 10, "processed {processed}");
    assert_eq!(last["unprocessed"].as_u64().unwrap(), 10 - processed);
    assert_eq!(
        frames.iter().filter(|f| f["progress"] == "cancelled").count(),
        1
    );
}

#[tokio::test]
async fn test_upload_rate_limit() {
    let server =
        common::start_with(|config| config.limits.upload_requests_per_hour = 1).await;

    let csv = common::csv_rows(&["alice"]);
    // Rejected uploads still count against the limit
    server.upload("/delete-users", "users.txt", &csv, &[]).await;

    let response = server.upload("/delete-users", "users.txt", &csv, &[]).await;
    assert_eq!(response.status(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Too many file uploads");
    assert!(body["retryAfter"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = common::start().await;
    assert_eq!(server.post("/export-users").await.status(), 404);
}
