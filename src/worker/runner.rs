use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::scheduler::table::SlotGuard;
use crate::scheduler::{Job, JobOutcome, SchedulerEvent};
use crate::worker::executor::JobHandler;

/// Runs a single job on the slot claimed for it.
#[derive(Clone)]
pub struct JobRunner {
    handler: Arc<dyn JobHandler>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner").finish_non_exhaustive()
    }
}

impl JobRunner {
    pub fn new(handler: Arc<dyn JobHandler>, events: broadcast::Sender<SchedulerEvent>) -> Self {
        Self { handler, events }
    }

    /// Execute `job`, then release its slot and emit one `Completed` event.
    ///
    /// The slot is released whatever the outcome: success, handler error,
    /// handler panic, or cancellation through `cancel`.
    pub async fn execute(
        &self,
        slot: SlotGuard,
        job: Job,
        cancel: CancellationToken,
    ) -> JobOutcome {
        let worker = slot.index();
        tracing::info!(job_id = %job.id, worker, "Worker started job");

        let work = AssertUnwindSafe(self.handler.run(&job)).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => JobOutcome::Cancelled,
            result = work => match result {
                Ok(Ok(())) => JobOutcome::Succeeded,
                Ok(Err(error)) => JobOutcome::Failed { error },
                Err(panic) => JobOutcome::Failed {
                    error: panic_message(panic.as_ref()),
                },
            },
        };

        if let Err(e) = slot.release() {
            tracing::error!(job_id = %job.id, worker, error = %e, "Failed to release worker slot");
        }

        match &outcome {
            JobOutcome::Succeeded => {
                tracing::info!(job_id = %job.id, worker, "Worker completed job");
            }
            JobOutcome::Failed { error } => {
                tracing::warn!(job_id = %job.id, worker, error = %error, "Job failed");
            }
            JobOutcome::Cancelled => {
                tracing::warn!(job_id = %job.id, worker, "Job cancelled");
            }
        }

        // No subscribers is fine
        let _ = self.events.send(SchedulerEvent::Completed {
            job_id: job.id,
            worker,
            outcome: outcome.clone(),
            at: Utc::now(),
        });

        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("job panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("job panicked: {}", msg)
    } else {
        "job panicked".to_string()
    }
}
