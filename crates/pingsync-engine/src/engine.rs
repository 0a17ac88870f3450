//! Batch row engine
//!
//! The [`RecordSyncEngine`] runs one [`BatchJob`] over a set of CSV rows,
//! calling the remote directory once or twice per row and reporting through
//! a [`ProgressSink`].
//!
//! ## Job Flow
//!
//! 1. **Validation**: credential format, row limit, required fields
//!    (import/upsert). Any failure ends the job with one error frame.
//! 2. **Token**: obtain an access token, then emit `started`
//! 3. **Rows**: sequentially, with a cancellation check before each row,
//!    a `processing` frame every `progress_every` rows and a cancellable
//!    pause between rows
//! 4. **Summary**: one `complete` frame with every counter
//!
//! ## Revalidation
//!
//! A directory call rejected with `InvalidCredentials` invalidates the cached
//! token, fetches a fresh one and repeats the call once. A second rejection
//! is fatal for the job.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pingsync_core::config::Config;
use pingsync_core::domain::{
    compute_update, AttributeAllowlist, AttributeMode, BatchJobState, BatchMode, Credentials,
    InputRow, JobId, JobStatus, RemoteRecord, RowOutcome, UserAttributes,
};
use pingsync_core::ports::{DirectoryError, DirectorySession, ITokenProvider, IUserDirectory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::csv_input::parse_rows;
use crate::progress::{ProgressFrame, ProgressSink};
use crate::EngineError;

// ============================================================================
// Settings
// ============================================================================

/// Pacing and limits applied to every job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Pause between rows, not after the last one
    pub inter_row_delay: Duration,
    /// Emit a `processing` frame after this many rows
    pub progress_every: usize,
    /// Largest accepted row count
    pub max_rows: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            inter_row_delay: Duration::from_millis(200),
            progress_every: 5,
            max_rows: 1000,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            inter_row_delay: config.engine.inter_row_delay(),
            progress_every: config.engine.progress_every,
            max_rows: config.limits.max_rows,
        }
    }
}

// ============================================================================
// BatchJob
// ============================================================================

/// Everything one job needs besides its rows
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: JobId,
    pub mode: BatchMode,
    pub credentials: Credentials,
    /// Modify/upsert only
    pub attribute_mode: AttributeMode,
    /// Modify/upsert only; empty allows every attribute
    pub allowlist: AttributeAllowlist,
}

impl BatchJob {
    pub fn new(id: JobId, mode: BatchMode, credentials: Credentials) -> Self {
        Self {
            id,
            mode,
            credentials,
            attribute_mode: AttributeMode::All,
            allowlist: AttributeAllowlist::allow_all(),
        }
    }

    /// Build a job from the textual options of an upload form or command line.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] for an unknown mode, modify mode or
    /// attribute name.
    pub fn from_options<S: AsRef<str>>(
        id: JobId,
        mode: &str,
        credentials: Credentials,
        modify_mode: Option<&str>,
        attributes: &[S],
    ) -> Result<Self, EngineError> {
        let mode: BatchMode = mode.parse()?;
        let attribute_mode = match modify_mode {
            Some(value) => value.parse()?,
            None => AttributeMode::default(),
        };
        let allowlist = AttributeAllowlist::parse(attributes)?;

        Ok(Self::new(id, mode, credentials)
            .with_attribute_mode(attribute_mode)
            .with_allowlist(allowlist))
    }

    pub fn with_attribute_mode(mut self, attribute_mode: AttributeMode) -> Self {
        self.attribute_mode = attribute_mode;
        self
    }

    pub fn with_allowlist(mut self, allowlist: AttributeAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }
}

// ============================================================================
// JobReport
// ============================================================================

/// Outcome of [`RecordSyncEngine::run`], for the caller to log
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub mode: BatchMode,
    pub state: BatchJobState,
    pub duration: Duration,
    /// Message of the error frame that ended the job
    pub failure: Option<String>,
    /// The sink closed before the job finished
    pub disconnected: bool,
}

impl JobReport {
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }
}

/// How a row failed
#[derive(Debug)]
enum RowFailure {
    /// Counted as a row error; the job continues
    Row(DirectoryError),
    /// Ends the job
    Fatal(DirectoryError),
}

// ============================================================================
// RecordSyncEngine
// ============================================================================

/// Runs batch jobs against a user directory
#[derive(Clone)]
pub struct RecordSyncEngine {
    directory: Arc<dyn IUserDirectory>,
    tokens: Arc<dyn ITokenProvider>,
    settings: EngineSettings,
}

impl RecordSyncEngine {
    /// Creates a new `RecordSyncEngine`
    ///
    /// # Arguments
    /// * `directory` - Remote user operations (IUserDirectory)
    /// * `tokens` - Access token source (ITokenProvider)
    /// * `settings` - Pacing and limits
    pub fn new(
        directory: Arc<dyn IUserDirectory>,
        tokens: Arc<dyn ITokenProvider>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            directory,
            tokens,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Decode `data` as CSV and run the job over its rows.
    ///
    /// Undecodable input ends the job with one error frame.
    pub async fn run_csv<S>(
        &self,
        job: &BatchJob,
        data: &[u8],
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> JobReport
    where
        S: ProgressSink + ?Sized,
    {
        match parse_rows(data) {
            Ok(rows) => self.run(job, &rows, cancel, sink).await,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "Rejected CSV upload");
                let frame = ProgressFrame::error(err.to_string(), Vec::new());
                self.fail(job, BatchJobState::new(0), Instant::now(), frame, sink)
                    .await
            }
        }
    }

    /// Run one job to completion, cancellation or failure.
    ///
    /// Every outcome is reported through `sink`; the returned [`JobReport`]
    /// mirrors what was sent.
    #[tracing::instrument(skip_all, fields(job_id = %job.id, mode = %job.mode, rows = rows.len()))]
    pub async fn run<S>(
        &self,
        job: &BatchJob,
        rows: &[InputRow],
        cancel: &CancellationToken,
        sink: &mut S,
    ) -> JobReport
    where
        S: ProgressSink + ?Sized,
    {
        let started = Instant::now();
        let mut state = BatchJobState::new(rows.len());

        if let Some(frame) = self.validate(job, rows) {
            info!("Batch job rejected by validation");
            return self.fail(job, state, started, frame, sink).await;
        }

        let mut session = match self.tokens.get_token(&job.credentials).await {
            Ok(token) => DirectorySession::new(&job.credentials.environment_id, token),
            Err(err) => {
                warn!(error = %err, "Could not obtain access token");
                let frame = ProgressFrame::error(err.to_string(), Vec::new());
                return self.fail(job, state, started, frame, sink).await;
            }
        };

        info!(total = rows.len(), "Starting batch job");
        if sink
            .emit(ProgressFrame::started(job.id, &state))
            .await
            .is_err()
        {
            return self.disconnected(job, state, started);
        }
        set_status(&mut state, JobStatus::Processing);

        let every = self.settings.progress_every.max(1);
        let total = rows.len();

        for (index, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.cancelled(job, state, started, sink).await;
            }

            match self.process_row(job, &mut session, row).await {
                Ok(outcome) => {
                    debug!(row = row.number(), username = row.label(), %outcome, "Row processed");
                    state.record_outcome(outcome);
                }
                Err(RowFailure::Row(err)) => {
                    warn!(row = row.number(), username = row.label(), error = %err, "Row failed");
                    state.record_error(row_detail(row, &err));
                }
                Err(RowFailure::Fatal(err)) => {
                    error!(row = row.number(), error = %err, "Access token rejected after refresh");
                    let frame =
                        ProgressFrame::error(format!("Authentication failed: {err}"), Vec::new());
                    return self.fail(job, state, started, frame, sink).await;
                }
            }

            let last = index + 1 == total;
            if (state.processed() % every == 0 || last)
                && sink.emit(ProgressFrame::processing(&state)).await.is_err()
            {
                return self.disconnected(job, state, started);
            }

            if !last && !self.settings.inter_row_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.inter_row_delay) => {}
                }
            }
        }

        set_status(&mut state, JobStatus::Completed);
        let counters = state.counters();
        info!(
            added = counters.added,
            modified = counters.modified,
            skipped = counters.skipped,
            not_found = counters.not_found,
            deleted = counters.deleted,
            errors = counters.errors,
            "Batch job complete"
        );

        let disconnected = sink.emit(ProgressFrame::complete(&state)).await.is_err();
        self.report(job, state, started, None, disconnected)
    }

    /// Job-level checks, in order; the first failure becomes the error frame
    fn validate(&self, job: &BatchJob, rows: &[InputRow]) -> Option<ProgressFrame> {
        let credential_errors = job.credentials.validate();
        if !credential_errors.is_empty() {
            return Some(ProgressFrame::error(
                "Invalid credentials format.",
                credential_errors,
            ));
        }

        if rows.len() > self.settings.max_rows {
            return Some(ProgressFrame::error(
                format!("Too many users. Maximum allowed: {}", self.settings.max_rows),
                vec![format!("{} rows uploaded", rows.len())],
            ));
        }

        if job.mode.requires_full_rows() {
            let details: Vec<String> = rows
                .iter()
                .filter_map(|row| {
                    let missing = row.missing_required();
                    (!missing.is_empty()).then(|| {
                        let names: Vec<&str> = missing.iter().map(|f| f.header()).collect();
                        format!(
                            "Row {} missing required fields: {}",
                            row.number(),
                            names.join(", ")
                        )
                    })
                })
                .collect();
            if !details.is_empty() {
                return Some(ProgressFrame::error("Missing required fields.", details));
            }
        }

        None
    }

    // ========================================================================
    // Per-row operations
    // ========================================================================

    async fn process_row(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        row: &InputRow,
    ) -> Result<RowOutcome, RowFailure> {
        match job.mode {
            BatchMode::Import => self.create_row(job, session, row).await,
            BatchMode::Modify => match self.lookup(job, session, row).await? {
                Some(existing) => self.patch_row(job, session, row, existing).await,
                None => Ok(RowOutcome::Skipped),
            },
            BatchMode::Delete => match self.lookup(job, session, row).await? {
                Some(existing) => self.delete_row(job, session, existing).await,
                None => Ok(RowOutcome::NotFound),
            },
            BatchMode::Upsert => match self.lookup(job, session, row).await? {
                Some(existing) => self.patch_row(job, session, row, existing).await,
                None => self.create_row(job, session, row).await,
            },
        }
    }

    async fn lookup(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        row: &InputRow,
    ) -> Result<Option<RemoteRecord>, RowFailure> {
        let username = row.username().ok_or_else(|| {
            RowFailure::Row(DirectoryError::Validation("Username is required".to_string()))
        })?;
        let directory = &self.directory;
        self.call(job, session, move |s| async move {
            directory.find_by_username(&s, username).await
        })
        .await
    }

    /// Create; an existing record counts as skipped
    async fn create_row(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        row: &InputRow,
    ) -> Result<RowOutcome, RowFailure> {
        let attributes = UserAttributes::from_row(row);
        let directory = &self.directory;
        let attributes = &attributes;

        match self
            .call(job, session, move |s| async move {
                directory.create(&s, attributes).await
            })
            .await
        {
            Ok(_) => Ok(RowOutcome::Added),
            Err(RowFailure::Row(DirectoryError::Conflict(_))) => Ok(RowOutcome::Skipped),
            Err(other) => Err(other),
        }
    }

    /// Diff against `existing` and patch; an empty diff counts as skipped
    async fn patch_row(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        row: &InputRow,
        existing: RemoteRecord,
    ) -> Result<RowOutcome, RowFailure> {
        let desired = UserAttributes::from_row(row).to_json_map();
        let update = compute_update(
            &desired,
            &existing.attributes,
            &job.allowlist,
            job.attribute_mode,
        );
        if update.is_empty() {
            return Ok(RowOutcome::Skipped);
        }

        let directory = &self.directory;
        let (id, update) = (&existing.id, &update);
        self.call(job, session, move |s| async move {
            directory.patch(&s, id, update).await
        })
        .await?;
        Ok(RowOutcome::Modified)
    }

    /// Delete; a record gone since the lookup counts as not found
    async fn delete_row(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        existing: RemoteRecord,
    ) -> Result<RowOutcome, RowFailure> {
        let directory = &self.directory;
        let id = &existing.id;

        match self
            .call(job, session, move |s| async move { directory.delete(&s, id).await })
            .await
        {
            Ok(()) => Ok(RowOutcome::Deleted),
            Err(RowFailure::Row(DirectoryError::RemoteApi { status: 404, .. })) => {
                Ok(RowOutcome::NotFound)
            }
            Err(other) => Err(other),
        }
    }

    /// Run a directory call, revalidating the token once on an auth failure.
    ///
    /// On success after revalidation, `session` keeps the fresh token for
    /// the rest of the job.
    async fn call<T, F, Fut>(
        &self,
        job: &BatchJob,
        session: &mut DirectorySession,
        op: F,
    ) -> Result<T, RowFailure>
    where
        F: Fn(DirectorySession) -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        match op(session.clone()).await {
            Err(err) if err.is_auth_failure() => {
                info!("Access token rejected, fetching a fresh one");
                self.tokens
                    .invalidate(&job.credentials, &session.token)
                    .await;
                session.token = self
                    .tokens
                    .get_token(&job.credentials)
                    .await
                    .map_err(RowFailure::Fatal)?;

                op(session.clone()).await.map_err(|err| {
                    if err.is_auth_failure() {
                        RowFailure::Fatal(err)
                    } else {
                        RowFailure::Row(err)
                    }
                })
            }
            other => other.map_err(RowFailure::Row),
        }
    }

    // ========================================================================
    // Endings
    // ========================================================================

    async fn cancelled<S>(
        &self,
        job: &BatchJob,
        mut state: BatchJobState,
        started: Instant,
        sink: &mut S,
    ) -> JobReport
    where
        S: ProgressSink + ?Sized,
    {
        set_status(&mut state, JobStatus::Cancelled);
        info!(
            processed = state.processed(),
            unprocessed = state.unprocessed(),
            "Batch job cancelled"
        );
        let disconnected = sink.emit(ProgressFrame::cancelled(&state)).await.is_err();
        self.report(job, state, started, None, disconnected)
    }

    fn disconnected(
        &self,
        job: &BatchJob,
        mut state: BatchJobState,
        started: Instant,
    ) -> JobReport {
        set_status(&mut state, JobStatus::Cancelled);
        info!(
            processed = state.processed(),
            "Progress consumer went away, batch job cancelled"
        );
        self.report(job, state, started, None, true)
    }

    async fn fail<S>(
        &self,
        job: &BatchJob,
        mut state: BatchJobState,
        started: Instant,
        frame: ProgressFrame,
        sink: &mut S,
    ) -> JobReport
    where
        S: ProgressSink + ?Sized,
    {
        set_status(&mut state, JobStatus::Failed);
        let failure = match &frame {
            ProgressFrame::Error(e) => Some(e.error.clone()),
            ProgressFrame::Status(_) => None,
        };
        let disconnected = sink.emit(frame).await.is_err();
        self.report(job, state, started, failure, disconnected)
    }

    fn report(
        &self,
        job: &BatchJob,
        state: BatchJobState,
        started: Instant,
        failure: Option<String>,
        disconnected: bool,
    ) -> JobReport {
        JobReport {
            job_id: job.id,
            mode: job.mode,
            state,
            duration: started.elapsed(),
            failure,
            disconnected,
        }
    }
}

fn set_status(state: &mut BatchJobState, target: JobStatus) {
    if let Err(err) = state.transition_to(target) {
        error!(%err, "Invalid job status transition");
    }
}

/// `Row N (label): message`, without the parenthesis when the row has no label
fn row_detail(row: &InputRow, err: &DirectoryError) -> String {
    match row.label() {
        "" => format!("Row {}: {err}", row.number()),
        label => format!("Row {} ({label}): {err}", row.number()),
    }
}
