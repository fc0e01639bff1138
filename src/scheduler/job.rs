use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::WorkerIndex;

/// Dispatcher-assigned job identifier. Dense and strictly increasing from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub const FIRST: JobId = JobId(1);

    /// The id following this one, or `None` once the counter is exhausted.
    pub fn next(self) -> Option<JobId> {
        self.0.checked_add(1).map(JobId)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job bound to the worker slot that was claimed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub worker: WorkerIndex,
    pub assigned_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, worker: WorkerIndex) -> Self {
        Self {
            id,
            worker,
            assigned_at: Utc::now(),
        }
    }
}

/// How a job ended. The slot is released in every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { error: String },
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Succeeded => write!(f, "succeeded"),
            JobOutcome::Failed { .. } => write!(f, "failed"),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Externally observable scheduler signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Assigned {
        job_id: JobId,
        worker: WorkerIndex,
        at: DateTime<Utc>,
    },
    Completed {
        job_id: JobId,
        worker: WorkerIndex,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    },
}

impl SchedulerEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            SchedulerEvent::Assigned { job_id, .. } | SchedulerEvent::Completed { job_id, .. } => {
                *job_id
            }
        }
    }

    pub fn worker(&self) -> WorkerIndex {
        match self {
            SchedulerEvent::Assigned { worker, .. } | SchedulerEvent::Completed { worker, .. } => {
                *worker
            }
        }
    }
}

impl std::fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerEvent::Assigned { job_id, worker, .. } => {
                write!(f, "Assigned Job {} to Worker {}", job_id, worker)
            }
            SchedulerEvent::Completed {
                job_id,
                worker,
                outcome: JobOutcome::Succeeded,
                ..
            } => write!(f, "Worker {} completed Job {}", worker, job_id),
            SchedulerEvent::Completed {
                job_id,
                worker,
                outcome: JobOutcome::Failed { error },
                ..
            } => write!(f, "Worker {} failed Job {}: {}", worker, job_id, error),
            SchedulerEvent::Completed {
                job_id,
                worker,
                outcome: JobOutcome::Cancelled,
                ..
            } => write!(f, "Worker {} cancelled Job {}", worker, job_id),
        }
    }
}
