//! Shared helpers for server tests
//!
//! Each test starts one wiremock server standing in for both PingOne hosts
//! and one pingsync server on an ephemeral port pointing at it.

use std::net::SocketAddr;
use std::sync::Arc;

use pingsync_core::config::{Config, ConfigBuilder};
use pingsync_server::{AppState, HttpServer};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ENV_ID: &str = "env12345";
pub const CLIENT_ID: &str = "client123";
pub const CLIENT_SECRET: &str = "secret123";

const BOUNDARY: &str = "pingsync-test-boundary";

pub const CSV_HEADER: &str = "username,email,firstName,lastName,populationId";

pub struct TestServer {
    pub pingone: MockServer,
    pub state: Arc<AppState>,
    addr: SocketAddr,
    http: reqwest::Client,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
    }
}

/// Start a server with fast retries and no inter-row delay
pub async fn start() -> TestServer {
    start_with(|_| {}).await
}

pub async fn start_with(configure: impl FnOnce(&mut Config)) -> TestServer {
    let pingone = MockServer::start().await;
    let mut config = ConfigBuilder::new()
        .server_bind("127.0.0.1:0")
        .pingone_auth_base_url(pingone.uri())
        .pingone_api_base_url(pingone.uri())
        .http_backoff_base_ms(10)
        .token_cache_min_fetch_interval_ms(0)
        .engine_inter_row_delay_ms(0)
        .build();
    configure(&mut config);

    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let server = HttpServer::bind(Arc::clone(&state)).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    TestServer {
        pingone,
        state,
        addr,
        http: reqwest::Client::new(),
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a multipart form with the test credentials, `extra` fields and
    /// the CSV under `file_name`
    pub async fn upload(
        &self,
        route: &str,
        file_name: &str,
        csv: &str,
        extra: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut fields = vec![
            ("environmentId", ENV_ID),
            ("clientId", CLIENT_ID),
            ("clientSecret", CLIENT_SECRET),
        ];
        fields.extend_from_slice(extra);

        self.http
            .post(self.url(route))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(&fields, file_name, csv))
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, route: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(self.url(route))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, route: &str) -> reqwest::Response {
        self.http.post(self.url(route)).send().await.unwrap()
    }
}

fn multipart_body(fields: &[(&str, &str)], file_name: &str, csv: &str) -> String {
    let mut out = String::new();
    for (name, value) in fields {
        out.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    out.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csv\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{BOUNDARY}--\r\n"
    ));
    out
}

/// Read an NDJSON body into one value per line
pub async fn frames(response: reqwest::Response) -> Vec<Value> {
    response
        .text()
        .await
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn credentials_json() -> Value {
    json!({"environmentId": ENV_ID, "clientId": CLIENT_ID, "clientSecret": CLIENT_SECRET})
}

pub fn users_path() -> String {
    format!("/v1/environments/{ENV_ID}/users")
}

pub fn csv_rows(usernames: &[&str]) -> String {
    let mut csv = format!("{CSV_HEADER}\n");
    for name in usernames {
        csv.push_str(&format!("{name},{name}@example.com,Test,User,pop-1\n"));
    }
    csv
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{ENV_ID}/as/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-access-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Every username search comes back empty
pub async fn mount_empty_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(users_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"_embedded": {"users": []}, "count": 0})),
        )
        .mount(server)
        .await;
}

pub async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(users_path()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "u-new",
            "username": "created"
        })))
        .mount(server)
        .await;
}
