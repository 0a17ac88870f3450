//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! invalid identifiers, rejected job state transitions, and input that
//! fails validation before a batch job starts.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid remote record identifier
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Unrecognised batch mode
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    /// Attribute name outside the modify allowlist vocabulary
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
