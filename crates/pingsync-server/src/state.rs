//! Services shared by every request

use std::sync::Arc;

use pingsync_core::config::Config;
use pingsync_core::domain::JobStatus;
use pingsync_engine::engine::{EngineSettings, JobReport, RecordSyncEngine};
use pingsync_engine::jobs::JobRegistry;
use pingsync_pingone::client::PingOneClient;
use pingsync_pingone::provider::PingOneDirectory;
use pingsync_pingone::token_cache::TokenCache;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::rate_limit::RateLimits;

/// The PingOne adapters and the engine wired on top of them
#[derive(Clone)]
pub struct Services {
    pub tokens: Arc<TokenCache>,
    pub directory: Arc<PingOneDirectory>,
    pub engine: RecordSyncEngine,
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        let tokens = Arc::new(TokenCache::from_config(config));
        let directory = Arc::new(PingOneDirectory::new(PingOneClient::from_config(config)));
        let engine = RecordSyncEngine::new(
            directory.clone(),
            tokens.clone(),
            EngineSettings::from_config(config),
        );

        Self {
            tokens,
            directory,
            engine,
        }
    }
}

/// State behind the HTTP routes
pub struct AppState {
    pub config: Config,
    pub services: Services,
    pub jobs: Arc<JobRegistry>,
    pub limits: RateLimits,
    /// Cancelled on SIGINT/SIGTERM; every job token is a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self {
            services: Services::from_config(&config),
            jobs: Arc::new(JobRegistry::new()),
            limits: RateLimits::from_config(&config.limits),
            config,
            shutdown,
        }
    }
}

/// Log the outcome of a finished job
pub fn log_report(report: &JobReport) {
    let counters = report.state.counters();
    match report.status() {
        JobStatus::Failed => warn!(
            job_id = %report.job_id,
            mode = %report.mode,
            failure = report.failure.as_deref().unwrap_or_default(),
            "Job failed"
        ),
        status => info!(
            job_id = %report.job_id,
            mode = %report.mode,
            ?status,
            total = report.state.total(),
            processed = report.state.processed(),
            added = counters.added,
            modified = counters.modified,
            skipped = counters.skipped,
            not_found = counters.not_found,
            deleted = counters.deleted,
            errors = counters.errors,
            disconnected = report.disconnected,
            duration_ms = report.duration.as_millis() as u64,
            "Job finished"
        ),
    }
}
