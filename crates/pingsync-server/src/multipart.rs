//! Decoding of the job upload form
//!
//! The form carries one `csv` file field plus text fields for the
//! credentials and the modify options. Unknown fields are ignored.

use std::error::Error as StdError;

use futures_util::Stream;
use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use multer::{Constraints, Multipart, SizeLimit};
use pingsync_core::domain::Credentials;
use tracing::debug;

use crate::http::ApiError;

/// A decoded upload
#[derive(Default)]
pub struct UploadForm {
    pub csv: Option<Bytes>,
    pub file_name: Option<String>,
    pub environment_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub mode: Option<String>,
    pub modify_mode: Option<String>,
    pub modify_attributes: Vec<String>,
}

impl std::fmt::Debug for UploadForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadForm")
            .field("csv_bytes", &self.csv.as_ref().map(Bytes::len))
            .field("file_name", &self.file_name)
            .field("environment_id", &self.environment_id)
            .field("mode", &self.mode)
            .field("modify_mode", &self.modify_mode)
            .field("modify_attributes", &self.modify_attributes)
            .finish_non_exhaustive()
    }
}

impl UploadForm {
    /// Read a `multipart/form-data` request body of at most `max_bytes`
    pub async fn from_request(req: Request<Incoming>, max_bytes: usize) -> Result<Self, ApiError> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("Expected multipart/form-data"))?;
        let boundary = multer::parse_boundary(content_type)
            .map_err(|_| ApiError::bad_request("Expected multipart/form-data"))?;

        Self::from_stream(req.into_body().into_data_stream(), boundary, max_bytes).await
    }

    /// Decode a multipart stream delimited by `boundary`
    pub async fn from_stream<S, O, E>(
        stream: S,
        boundary: String,
        max_bytes: usize,
    ) -> Result<Self, ApiError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let constraints =
            Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes as u64));
        let mut multipart = Multipart::with_constraints(stream, boundary, constraints);
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| upload_error(e, max_bytes))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "csv" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    if !has_csv_extension(&file_name) {
                        return Err(ApiError::bad_request("Invalid file type. Allowed types: .csv"));
                    }
                    let data = field.bytes().await.map_err(|e| upload_error(e, max_bytes))?;
                    debug!(file_name = %file_name, bytes = data.len(), "Received CSV upload");
                    form.file_name = Some(file_name);
                    form.csv = Some(data);
                }
                "environmentId" | "clientId" | "clientSecret" | "mode" | "modifyMode"
                | "modifyAttributes" => {
                    let text = field.text().await.map_err(|e| upload_error(e, max_bytes))?;
                    form.set_text(&name, text.trim());
                }
                other => {
                    debug!(field = other, "Ignoring unknown form field");
                }
            }
        }

        Ok(form)
    }

    fn set_text(&mut self, name: &str, value: &str) {
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match name {
            "environmentId" => self.environment_id = value.to_string(),
            "clientId" => self.client_id = value.to_string(),
            "clientSecret" => self.client_secret = value.to_string(),
            "mode" => self.mode = optional(),
            "modifyMode" => self.modify_mode = optional(),
            "modifyAttributes" => self.modify_attributes = parse_attribute_list(value),
            _ => {}
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.environment_id, &self.client_id, &self.client_secret)
    }

    /// The uploaded CSV, or a 400 when the form had none
    pub fn take_csv(&mut self) -> Result<Bytes, ApiError> {
        self.csv
            .take()
            .ok_or_else(|| ApiError::bad_request("No file uploaded"))
    }
}

fn has_csv_extension(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// JSON array of attribute names; anything else reads as empty
fn parse_attribute_list(value: &str) -> Vec<String> {
    serde_json::from_str(value).unwrap_or_default()
}

fn upload_error(err: multer::Error, max_bytes: usize) -> ApiError {
    match err {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            ApiError::PayloadTooLarge(format!(
                "File too large. Maximum size: {}MB",
                max_bytes / (1024 * 1024)
            ))
        }
        other => ApiError::bad_request(format!("Invalid upload: {other}")),
    }
}
