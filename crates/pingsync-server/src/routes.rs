//! Request routing and the route handlers
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /import-users` | [`start_job`] with the form's `mode` |
//! | `POST /modify-users` | [`start_job`] in modify mode |
//! | `POST /delete-users` | [`start_job`] in delete mode |
//! | `POST /cancel/{jobId}` | [`cancel_job`] |
//! | `POST /get-worker-token` | [`worker_token`] |
//! | `POST /get-environment-details` | [`environment_details`] |

use std::net::IpAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use pingsync_core::domain::{Credentials, JobId};
use pingsync_core::ports::{DirectorySession, IUserDirectory};
use pingsync_engine::engine::BatchJob;
use pingsync_engine::progress::ChannelSink;
use serde_json::json;
use tracing::{debug, info};

use crate::http::{json_response, ndjson_response, ApiError, ResponseBody};
use crate::multipart::UploadForm;
use crate::state::{log_report, AppState};

/// Largest accepted JSON body on the credential endpoints
const MAX_JSON_BYTES: usize = 64 * 1024;

const CANCEL_PREFIX: &str = "/cancel/";

/// Dispatch one request
pub async fn handle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer: IpAddr,
) -> Response<ResponseBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, %peer, "Request");

    let result = match (&method, path.as_str()) {
        (&Method::POST, "/import-users") => start_job(req, &state, peer, JobRoute::Import).await,
        (&Method::POST, "/modify-users") => start_job(req, &state, peer, JobRoute::Modify).await,
        (&Method::POST, "/delete-users") => start_job(req, &state, peer, JobRoute::Delete).await,
        (&Method::POST, "/get-worker-token") => worker_token(req, &state, peer).await,
        (&Method::POST, "/get-environment-details") => {
            environment_details(req, &state, peer).await
        }
        (&Method::POST, p) if p.starts_with(CANCEL_PREFIX) => {
            Ok(cancel_job(&state, &p[CANCEL_PREFIX.len()..]))
        }
        _ => Err(ApiError::NotFound(format!("No route for {method} {path}"))),
    };

    result.unwrap_or_else(|err| {
        debug!(%path, status = %err.status(), error = %err, "Request rejected");
        err.into_response()
    })
}

// ============================================================================
// Jobs
// ============================================================================

/// Which upload route a job arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRoute {
    Import,
    Modify,
    Delete,
}

impl JobRoute {
    /// The job mode for this route given the form's optional `mode` field
    pub fn mode(self, requested: Option<&str>) -> Result<&str, ApiError> {
        match self {
            JobRoute::Import => match requested.unwrap_or("import") {
                m @ ("import" | "modify" | "import+modify" | "upsert") => Ok(m),
                other => Err(ApiError::bad_request(format!(
                    "Unsupported mode for /import-users: {other}"
                ))),
            },
            JobRoute::Modify => Ok("modify"),
            JobRoute::Delete => Ok("delete"),
        }
    }
}

/// Accept an upload and stream the job's progress as NDJSON
///
/// The job runs in its own task; the response body is fed from its
/// progress channel and ends when the job does.
pub async fn start_job(
    req: Request<Incoming>,
    state: &Arc<AppState>,
    peer: IpAddr,
    route: JobRoute,
) -> Result<Response<ResponseBody>, ApiError> {
    state.limits.uploads.check(peer)?;

    let mut form = UploadForm::from_request(req, state.config.limits.max_upload_bytes).await?;
    let csv = form.take_csv()?;
    let mode = route.mode(form.mode.as_deref())?;

    let handle = state.jobs.register_child(&state.shutdown);
    let job = BatchJob::from_options(
        handle.id(),
        mode,
        form.credentials(),
        form.modify_mode.as_deref(),
        &form.modify_attributes,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    info!(
        job_id = %job.id,
        mode = %job.mode,
        file_name = form.file_name.as_deref().unwrap_or_default(),
        bytes = csv.len(),
        %peer,
        "Accepted upload"
    );

    let (mut sink, rx) = ChannelSink::channel(state.config.engine.channel_capacity);
    let engine = state.services.engine.clone();
    let job_id = job.id;
    tokio::spawn(async move {
        let report = engine.run_csv(&job, &csv, handle.token(), &mut sink).await;
        log_report(&report);
        drop(handle);
    });

    Ok(ndjson_response(job_id, rx))
}

/// Signal one running job to stop at its next row boundary
pub fn cancel_job(state: &AppState, raw_id: &str) -> Response<ResponseBody> {
    let cancelled = raw_id
        .parse::<JobId>()
        .map(|id| state.jobs.cancel(&id))
        .unwrap_or(false);

    if cancelled {
        json_response(StatusCode::OK, &json!({ "cancelled": true, "jobId": raw_id }))
    } else {
        json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Job not found", "jobId": raw_id }),
        )
    }
}

// ============================================================================
// Credential endpoints
// ============================================================================

/// Exchange credentials for an access token
pub async fn worker_token(
    req: Request<Incoming>,
    state: &AppState,
    peer: IpAddr,
) -> Result<Response<ResponseBody>, ApiError> {
    state.limits.auth.check(peer)?;
    let credentials = read_credentials(req).await?;

    let token = state.services.tokens.get_token(&credentials).await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({ "access_token": token.secret() }),
    ))
}

/// Describe the environment the credentials belong to
pub async fn environment_details(
    req: Request<Incoming>,
    state: &AppState,
    peer: IpAddr,
) -> Result<Response<ResponseBody>, ApiError> {
    state.limits.auth.check(peer)?;
    let credentials = read_credentials(req).await?;

    let services = &state.services;
    let token = services.tokens.get_token(&credentials).await?;
    let session = DirectorySession::new(&credentials.environment_id, token);

    match services.directory.environment(&session).await {
        Ok(details) => Ok(json_response(StatusCode::OK, &details)),
        Err(err) => {
            if err.is_auth_failure() {
                services
                    .tokens
                    .invalidate(&credentials, &session.token)
                    .await;
            }
            Err(err.into())
        }
    }
}

/// Decode and validate a JSON credentials body
async fn read_credentials(req: Request<Incoming>) -> Result<Credentials, ApiError> {
    let body = Limited::new(req.into_body(), MAX_JSON_BYTES)
        .collect()
        .await
        .map_err(|_| ApiError::PayloadTooLarge("Request body too large".to_string()))?
        .to_bytes();

    let credentials: Credentials = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;

    let errors = credentials.validate();
    if !errors.is_empty() {
        return Err(ApiError::BadRequest {
            message: "Invalid credentials format.".to_string(),
            details: errors,
        });
    }
    Ok(credentials)
}
