//! Batch job domain types
//!
//! A batch job walks the rows of one uploaded CSV in a single [`BatchMode`].
//! [`BatchJobState`] carries the counters and the status machine
//! `Started -> Processing -> {Completed | Cancelled | Failed}`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::DomainError;

// ============================================================================
// BatchMode
// ============================================================================

/// What a job does with each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Create every row; existing usernames are skipped
    Import,
    /// Patch existing users; unknown usernames are skipped
    Modify,
    /// Delete existing users; unknown usernames count as not found
    Delete,
    /// Create unknown users and patch existing ones
    Upsert,
}

impl BatchMode {
    /// Whether every row must carry all required fields before the job starts
    pub fn requires_full_rows(&self) -> bool {
        matches!(self, BatchMode::Import | BatchMode::Upsert)
    }
}

impl FromStr for BatchMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "import" => Ok(BatchMode::Import),
            "modify" => Ok(BatchMode::Modify),
            "delete" => Ok(BatchMode::Delete),
            "upsert" | "import+modify" => Ok(BatchMode::Upsert),
            other => Err(DomainError::UnknownMode(other.to_string())),
        }
    }
}

impl Display for BatchMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::Import => f.write_str("import"),
            BatchMode::Modify => f.write_str("modify"),
            BatchMode::Delete => f.write_str("delete"),
            BatchMode::Upsert => f.write_str("upsert"),
        }
    }
}

// ============================================================================
// RowOutcome / Counters
// ============================================================================

/// Successful result of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Added,
    Modified,
    Skipped,
    NotFound,
    Deleted,
}

impl Display for RowOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            RowOutcome::Added => "added",
            RowOutcome::Modified => "modified",
            RowOutcome::Skipped => "skipped",
            RowOutcome::NotFound => "not_found",
            RowOutcome::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Per-job tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub added: usize,
    pub modified: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl Counters {
    pub fn sum(&self) -> usize {
        self.added + self.modified + self.skipped + self.not_found + self.deleted + self.errors
    }
}

// ============================================================================
// JobStatus / BatchJobState
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Started,
    Processing,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (JobStatus::Started, JobStatus::Processing)
                | (JobStatus::Started, JobStatus::Cancelled)
                | (JobStatus::Started, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Started => "started",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress and outcome of one batch job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJobState {
    total: usize,
    processed: usize,
    counters: Counters,
    status: JobStatus,
    error_details: Vec<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl BatchJobState {
    /// New job over `total` rows, in `Started`
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            counters: Counters::default(),
            status: JobStatus::Started,
            error_details: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn unprocessed(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_details(&self) -> &[String] {
        &self.error_details
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: JobStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        if target.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Count a row that finished without error
    pub fn record_outcome(&mut self, outcome: RowOutcome) {
        self.processed += 1;
        match outcome {
            RowOutcome::Added => self.counters.added += 1,
            RowOutcome::Modified => self.counters.modified += 1,
            RowOutcome::Skipped => self.counters.skipped += 1,
            RowOutcome::NotFound => self.counters.not_found += 1,
            RowOutcome::Deleted => self.counters.deleted += 1,
        }
    }

    /// Count a failed row and keep its detail line
    pub fn record_error(&mut self, detail: impl Into<String>) {
        self.processed += 1;
        self.counters.errors += 1;
        self.error_details.push(detail.into());
    }

    /// `counters + unprocessed == total`, checked at terminal frames
    pub fn is_balanced(&self) -> bool {
        self.counters.sum() + self.unprocessed() == self.total
    }
}
