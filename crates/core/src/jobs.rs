use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::CachedAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// In-memory record of one asynchronous analysis run.
///
/// Jobs live for the process lifetime only; there is no persistence across
/// restarts.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub result: Option<CachedAnalysis>,
    pub error: Option<String>,
    #[serde(skip)]
    cancel: CancellationToken,
}

/// Shared registry of jobs. The orchestrator is the sole writer per job;
/// pollers only read. Mutations on unknown ids are no-ops so callers can
/// race harmlessly against jobs that were never created here, and terminal
/// jobs ignore further mutation.
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            status: JobStatus::Queued,
            progress: 0,
            message: "Queued".to_string(),
            created_at: Utc::now(),
            result: None,
            error: None,
            cancel: CancellationToken::new(),
        };
        self.inner
            .write()
            .expect("job store lock poisoned")
            .insert(id, job);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.inner
            .read()
            .expect("job store lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn update_progress(&self, id: Uuid, progress: u8, message: impl Into<String>) {
        self.mutate(id, |job| {
            job.status = JobStatus::Processing;
            job.progress = progress.min(100);
            job.message = message.into();
        });
    }

    pub fn complete(&self, id: Uuid, result: CachedAnalysis) {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.message = "Analysis complete".to_string();
            job.result = Some(result);
        });
    }

    pub fn fail(&self, id: Uuid, error: impl Into<String>) {
        let error = error.into();
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.message = format!("Failed: {error}");
            job.error = Some(error);
        });
    }

    /// Request cancellation. The orchestrator checks the token between
    /// chunks; an in-flight gateway call is not preempted.
    pub fn cancel(&self, id: Uuid) {
        if let Some(job) = self.get(id)
            && !job.status.is_terminal()
        {
            job.cancel.cancel();
        }
    }

    pub fn cancellation(&self, id: Uuid) -> Option<CancellationToken> {
        self.get(id).map(|job| job.cancel.clone())
    }

    fn mutate(&self, id: Uuid, apply: impl FnOnce(&mut Job)) {
        let mut jobs = self.inner.write().expect("job store lock poisoned");
        if let Some(job) = jobs.get_mut(&id)
            && !job.status.is_terminal()
        {
            apply(job);
        }
    }
}
