//! Client-credentials triple supplied with each request.

use std::fmt::{self, Debug, Formatter};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::{Uuid, Variant};

/// Environment, client id and secret for one batch job or token request.
///
/// Never persisted. The secret is excluded from `Debug` output and the token
/// cache is keyed by [`Credentials::cache_key`], never by the raw values.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub environment_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        environment_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            environment_id: environment_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Check the format of all three values and return every failure.
    ///
    /// An empty vector means the credentials may be sent to the token endpoint.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.environment_id.is_empty() {
            errors.push("Environment ID is required".to_string());
        } else if !is_valid_identifier(&self.environment_id) {
            errors.push(invalid_identifier("Environment ID"));
        }

        if self.client_id.is_empty() {
            errors.push("Client ID is required".to_string());
        } else if !is_valid_identifier(&self.client_id) {
            errors.push(invalid_identifier("Client ID"));
        }

        if self.client_secret.is_empty() {
            errors.push("Client Secret is required".to_string());
        } else if self.client_secret.chars().count() < 8 {
            errors.push("Client Secret must be at least 8 characters long".to_string());
        }

        errors
    }

    /// Deterministic SHA-256 digest of the three fields, hex encoded.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.environment_id, &self.client_id, &self.client_secret] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("environment_id", &self.environment_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

const UUID_EXAMPLE: &str = "12345678-1234-1234-1234-123456789012";

fn invalid_identifier(label: &str) -> String {
    format!(
        "{label} must be a valid UUID format (e.g., {UUID_EXAMPLE}) or alphanumeric string"
    )
}

/// Hyphenated RFC 4122 UUID of version 1-5, or at least 8 ASCII alphanumerics.
fn is_valid_identifier(value: &str) -> bool {
    let is_uuid = value.len() == 36
        && Uuid::parse_str(value)
            .map(|u| u.get_variant() == Variant::RFC4122 && (1..=5).contains(&u.get_version_num()))
            .unwrap_or(false);
    let is_alphanumeric = value.len() >= 8 && value.chars().all(|c| c.is_ascii_alphanumeric());
    is_uuid || is_alphanumeric
}
