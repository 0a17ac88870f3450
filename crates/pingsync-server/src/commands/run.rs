//! Run command - process one CSV locally and print the progress frames
//!
//! Frames go to stdout as NDJSON, logs go to stderr. The first Ctrl+C
//! cancels the job at its next row boundary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use pingsync_core::config::Config;
use pingsync_core::domain::{Credentials, JobStatus};
use pingsync_engine::engine::BatchJob;
use pingsync_engine::jobs::JobRegistry;
use pingsync_engine::progress::WriterSink;
use pingsync_server::state::log_report;
use pingsync_server::{shutdown_signal, Services};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Job mode: import, modify, delete or upsert
    #[arg(long, default_value = "import")]
    pub mode: String,

    /// CSV file to process
    #[arg(long)]
    pub file: PathBuf,

    /// Attribute mode for modify and upsert: all or changed-only
    #[arg(long)]
    pub modify_mode: Option<String>,

    /// Attribute a modify may change (repeatable; default all)
    #[arg(long = "attribute", value_name = "NAME")]
    pub attributes: Vec<String>,

    /// PingOne environment id
    #[arg(long, env = "PINGSYNC_ENVIRONMENT_ID")]
    pub environment_id: String,

    /// Worker application client id
    #[arg(long, env = "PINGSYNC_CLIENT_ID")]
    pub client_id: String,

    /// Worker application client secret
    #[arg(long, env = "PINGSYNC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

impl RunCommand {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.environment_id, &self.client_id, &self.client_secret)
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        let data = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let services = Services::from_config(&config);
        let jobs = Arc::new(JobRegistry::new());
        let handle = jobs.register_child(&shutdown);
        let job = BatchJob::from_options(
            handle.id(),
            &self.mode,
            self.credentials(),
            self.modify_mode.as_deref(),
            &self.attributes,
        )?;

        let mut sink = WriterSink::new(tokio::io::stdout());
        let report = services
            .engine
            .run_csv(&job, &data, handle.token(), &mut sink)
            .await;
        log_report(&report);

        match report.status() {
            JobStatus::Failed => bail!(report
                .failure
                .unwrap_or_else(|| "Job failed".to_string())),
            _ => Ok(()),
        }
    }
}
