//! Response bodies and the error type shared by the routes

use std::convert::Infallible;
use std::time::Duration;

use futures_util::stream;
use http_body_util::{combinators::BoxBody, BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use pingsync_core::domain::JobId;
use pingsync_core::ports::DirectoryError;
use pingsync_engine::progress::ProgressFrame;
use pingsync_pingone::PingOneError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;

pub type ResponseBody = BoxBody<Bytes, Infallible>;

pub const NDJSON: &str = "application/x-ndjson";
pub const JOB_ID_HEADER: &str = "x-job-id";

// ============================================================================
// ApiError
// ============================================================================

/// A request that ends with a JSON error body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{message}")]
    RateLimited {
        message: &'static str,
        retry_after: Duration,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::BadRequest { message, details } if !details.is_empty() => {
                json!({ "error": message, "details": details })
            }
            ApiError::RateLimited {
                message,
                retry_after,
            } => {
                // Round up so a client never retries early
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                json!({ "error": message, "retryAfter": secs })
            }
            other => json!({ "error": other.to_string() }),
        }
    }

    pub fn into_response(self) -> Response<ResponseBody> {
        json_response(self.status(), &self.body())
    }
}

impl From<PingOneError> for ApiError {
    fn from(err: PingOneError) -> Self {
        match err {
            PingOneError::Unauthorized(_) | PingOneError::Forbidden(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        if err.is_auth_failure() {
            ApiError::Unauthorized(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Stream frames from `rx` as NDJSON until the job drops its sender
pub fn ndjson_response(
    job_id: JobId,
    mut rx: mpsc::Receiver<ProgressFrame>,
) -> Response<ResponseBody> {
    let frames = stream::poll_fn(move |cx| {
        rx.poll_recv(cx)
            .map(|frame| frame.map(|f| Ok::<_, Infallible>(Frame::data(Bytes::from(f.to_line())))))
    });

    let mut response = Response::new(StreamBody::new(frames).boxed());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(NDJSON));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&job_id.to_string()) {
        headers.insert(HeaderName::from_static(JOB_ID_HEADER), value);
    }
    response
}
