//! pingsync Engine - batch user synchronization
//!
//! Provides:
//! - CSV decoding into typed rows
//! - The per-job row loop (import, modify, delete, upsert)
//! - Newline-delimited progress frames and the sinks they are written to
//! - Per-job cancellation
//!
//! ## Modules
//!
//! - [`engine`] - Row loop with silent token revalidation
//! - [`csv_input`] - Header-driven CSV decoding
//! - [`progress`] - Progress frames and sinks
//! - [`jobs`] - Registry of cancellable running jobs

pub mod csv_input;
pub mod engine;
pub mod jobs;
pub mod progress;

use thiserror::Error;

/// Errors raised before a job's rows are processed
#[derive(Debug, Error)]
pub enum EngineError {
    /// The upload could not be decoded as CSV
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// The upload has no header line
    #[error("CSV file appears to be empty or has no header row")]
    MissingHeader,

    /// A domain-level error propagated from pingsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] pingsync_core::domain::DomainError),
}
