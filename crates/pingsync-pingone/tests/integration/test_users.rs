//! User management endpoints and the directory port adapter

use pingsync_core::domain::{InputRow, RecordId, RowField, UserAttributes};
use pingsync_core::ports::{DirectoryError, IUserDirectory};
use pingsync_pingone::provider::PingOneDirectory;
use pingsync_pingone::PingOneError;
use serde_json::json;
use wiremock::{
    matchers::{bearer_token, body_json, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

fn sample_attributes() -> UserAttributes {
    let row = InputRow::new(1)
        .with(RowField::Username, "alice")
        .with(RowField::Email, "alice@example.com")
        .with(RowField::PopulationId, "pop-1")
        .with(RowField::FirstName, "Alice")
        .with(RowField::LastName, "Smith");
    UserAttributes::from_row(&row)
}

#[tokio::test]
async fn test_find_user_returns_first_match() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .and(query_param("filter", r#"username eq "alice""#))
        .and(bearer_token("test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"users": [
                common::user_json("u-1", "alice"),
                common::user_json("u-2", "alice")
            ]},
            "count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = client
        .find_user_by_username(&common::test_session(), "alice")
        .await
        .unwrap()
        .expect("user found");

    assert_eq!(user.id.as_str(), "u-1");
    assert_eq!(user.attributes["username"], "alice");
    assert_eq!(user.attributes["name"]["given"], "Test");
}

#[tokio::test]
async fn test_find_user_returns_none_on_empty_result() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"users": []},
            "count": 0
        })))
        .mount(&server)
        .await;

    let found = client
        .find_user_by_username(&common::test_session(), "ghost")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_find_user_escapes_filter_literal() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .and(query_param("filter", r#"username eq "a\"b&c""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let found = client
        .find_user_by_username(&common::test_session(), r#"a"b&c"#)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_find_user_rejects_control_characters_without_request() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .find_user_by_username(&common::test_session(), "bad\u{0}name")
        .await
        .unwrap_err();
    assert!(matches!(err, PingOneError::InvalidFilter(_)));
}

#[tokio::test]
async fn test_create_user_posts_attributes() {
    let (server, client) = common::setup_api_mock().await;
    let attributes = sample_attributes();

    Mock::given(method("POST"))
        .and(path(common::users_path()))
        .and(body_json(json!({
            "username": "alice",
            "email": "alice@example.com",
            "population": {"id": "pop-1"},
            "name": {"given": "Alice", "family": "Smith"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::user_json("u-9", "alice")))
        .expect(1)
        .mount(&server)
        .await;

    let created = client
        .create_user(&common::test_session(), &attributes)
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "u-9");
}

#[tokio::test]
async fn test_create_user_conflict_statuses() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "INVALID_DATA",
            "details": [{"code": "UNIQUENESS_VIOLATION", "target": "username"}]
        })))
        .mount(&server)
        .await;

    let session = common::test_session();
    let attributes = sample_attributes();
    for _ in 0..2 {
        let err = client.create_user(&session, &attributes).await.unwrap_err();
        assert!(matches!(err, PingOneError::Conflict(_)), "{err:?}");
    }
}

#[tokio::test]
async fn test_update_and_delete_user() {
    let (server, client) = common::setup_api_mock().await;
    let user_path = format!("{}/u-1", common::users_path());

    Mock::given(method("PATCH"))
        .and(path(user_path.clone()))
        .and(body_json(json!({"title": "Engineer"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::user_json("u-1", "alice")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(user_path))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let session = common::test_session();
    let id = RecordId::new("u-1".to_string()).unwrap();
    let mut update = serde_json::Map::new();
    update.insert("title".into(), json!("Engineer"));

    client.update_user(&session, &id, &update).await.unwrap();
    client.delete_user(&session, &id).await.unwrap();
}

#[tokio::test]
async fn test_get_environment() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/environments/{}", common::ENV_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": common::ENV_ID,
            "name": "Staging",
            "type": "SANDBOX",
            "region": "NA"
        })))
        .mount(&server)
        .await;

    let env = client
        .get_environment(&common::test_session())
        .await
        .unwrap();
    assert_eq!(env.name.as_deref(), Some("Staging"));
    assert_eq!(env.environment_type.as_deref(), Some("SANDBOX"));
}

#[tokio::test]
async fn test_directory_adapter_classifies_errors() {
    let (server, client) = common::setup_api_mock().await;
    let directory = PingOneDirectory::new(client);

    Mock::given(method("GET"))
        .and(path(common::users_path()))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let session = common::test_session();
    let err = directory
        .find_by_username(&session, "alice")
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());

    let err = directory
        .delete(&session, &RecordId::new("u-1".to_string()).unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        DirectoryError::RemoteApi {
            status: 500,
            body: "boom".into()
        }
    );
}
