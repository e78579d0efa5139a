//! In-memory job queue between the webhook route and background work.
//!
//! Producers (request handlers) push onto an unbounded tokio channel and never
//! wait. A single [`JobWorker`] drains it in FIFO order. Delivery is
//! at-most-once: a failed or panicking job is logged and dropped, and
//! anything still queued when the process stops is lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::github::error::{AuthError, GitHubApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    PrDiff,
    Push,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::PrDiff => f.write_str("pr_diff"),
            JobKind::Push => f.write_str("push"),
        }
    }
}

/// What a job is about. Carries the correlation fields for its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    PrDiff {
        repository_id: u64,
        repo_full_name: String,
        pull_request_id: u64,
        pr_number: u64,
        action: String,
    },
    Push {
        repository_id: u64,
        repo_full_name: String,
        git_ref: String,
        head_sha: Option<String>,
        commits_count: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            enqueued_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self.payload {
            JobPayload::PrDiff { .. } => JobKind::PrDiff,
            JobPayload::Push { .. } => JobKind::Push,
        }
    }

    /// Span carrying the job's identifying fields; every log line emitted
    /// while the job runs is tagged with them.
    pub fn span(&self) -> Span {
        match &self.payload {
            JobPayload::PrDiff {
                repository_id,
                repo_full_name,
                pr_number,
                ..
            } => info_span!(
                "job",
                job_id = %self.id,
                kind = %self.kind(),
                repository_id,
                repo = %repo_full_name,
                pr_number,
            ),
            JobPayload::Push {
                repository_id,
                repo_full_name,
                git_ref,
                ..
            } => info_span!(
                "job",
                job_id = %self.id,
                kind = %self.kind(),
                repository_id,
                repo = %repo_full_name,
                git_ref = %git_ref,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] GitHubApiError),

    #[error("invalid job: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// Producer side. Cheap to clone; one per request handler is fine.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Creates the queue and the worker that will drain it.
    pub fn new() -> (Self, JobWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            JobWorker {
                rx,
                handlers: HashMap::new(),
            },
        )
    }

    /// Never blocks. Only drops the job if the worker has already stopped,
    /// which happens during shutdown.
    pub fn enqueue(&self, job: Job) {
        let id = job.id;
        let kind = job.kind();
        match self.tx.send(job) {
            Ok(()) => info!(job_id = %id, %kind, "Enqueued job"),
            Err(_) => warn!(job_id = %id, %kind, "Job queue closed, dropping job"),
        }
    }
}

/// Consumer side: the single loop that runs queued jobs.
pub struct JobWorker {
    rx: mpsc::UnboundedReceiver<Job>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobWorker {
    pub fn with_handler(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<Job> {
        self.rx.try_recv().ok()
    }

    /// Runs until every [`JobQueue`] handle is dropped and the backlog is empty.
    pub async fn run(mut self) {
        info!("Job worker started");
        while let Some(job) = self.rx.recv().await {
            let span = job.span();
            self.process(&job).instrument(span).await;
        }
        info!("Job queue closed, worker stopping");
    }

    async fn process(&self, job: &Job) {
        let Some(handler) = self.handlers.get(&job.kind()) else {
            warn!("No handler registered for job kind, dropping job");
            return;
        };

        let waited_ms = (Utc::now() - job.enqueued_at).num_milliseconds();
        match AssertUnwindSafe(handler.handle(job)).catch_unwind().await {
            Ok(Ok(())) => info!(waited_ms, "Job completed"),
            Ok(Err(e)) => error!(error = %e, "Job failed, dropping"),
            Err(_) => error!("Job handler panicked, dropping"),
        }
    }
}
