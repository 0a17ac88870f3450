//! Domain entities and business logic
//!
//! - Newtypes for job ids, record ids and bearer tokens
//! - Credentials and their format validation
//! - CSV rows and their mapping to the directory's user shape
//! - Batch job state machine and counters
//! - Attribute diffing for modify jobs
//! - Domain-specific error types

pub mod credentials;
pub mod diff;
pub mod errors;
pub mod job;
pub mod newtypes;
pub mod record;
pub mod row;

// Re-export commonly used types
pub use credentials::Credentials;
pub use diff::{compute_update, AllowedAttribute, AttributeAllowlist, AttributeMode};
pub use errors::DomainError;
pub use job::{BatchJobState, BatchMode, Counters, JobStatus, RowOutcome};
pub use newtypes::*;
pub use record::{EnvironmentDetails, RemoteRecord, UserAttributes};
pub use row::{InputRow, RowField};
