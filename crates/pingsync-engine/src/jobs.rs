//! Registry of running jobs and their cancellation tokens
//!
//! Each job registers under a fresh [`JobId`] and keeps a [`JobHandle`]
//! for as long as it runs. Dropping the handle removes the entry, so a
//! finished job can no longer be cancelled.

use std::sync::Arc;

use dashmap::DashMap;
use pingsync_core::domain::JobId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Running jobs by id
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, CancellationToken>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job whose token is also cancelled with `parent`
    pub fn register_child(self: &Arc<Self>, parent: &CancellationToken) -> JobHandle {
        let token = parent.child_token();
        let id = JobId::new();
        self.jobs.insert(id, token.clone());
        debug!(job_id = %id, "Registered job");
        JobHandle {
            id,
            token,
            registry: Arc::clone(self),
        }
    }

    /// Request cancellation of one job.
    ///
    /// Returns `false` when no running job has this id.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.jobs.get(id) {
            Some(entry) => {
                entry.value().cancel();
                info!(job_id = %id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every running job, returning how many were signalled
    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for entry in self.jobs.iter() {
            entry.value().cancel();
            count += 1;
        }
        count
    }
}

/// Registration of one running job; deregisters on drop
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    token: CancellationToken,
    registry: Arc<JobRegistry>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.registry.jobs.remove(&self.id);
        debug!(job_id = %self.id, "Deregistered job");
    }
}
