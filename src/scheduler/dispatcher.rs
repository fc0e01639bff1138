use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SchedulerError};
use crate::scheduler::job::{Job, JobId, JobOutcome, SchedulerEvent};
use crate::scheduler::table::WorkerTable;
use crate::scheduler::WorkerIndex;
use crate::worker::JobRunner;

/// A successful claim: the job id handed out and the slot it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub job_id: JobId,
    pub worker: WorkerIndex,
}

/// Assigns an ever-increasing stream of job ids to idle worker slots.
///
/// The dispatcher owns the job id counter, so ids need no synchronization:
/// they are handed out in claim order, start at 1 and never skip or repeat.
/// Each assignment spawns a [`JobRunner`] task; those tasks are tracked in a
/// `JoinSet` that never holds more entries than the pool has slots.
pub struct Dispatcher {
    table: Arc<WorkerTable>,
    runner: JobRunner,
    events: broadcast::Sender<SchedulerEvent>,
    cancel: CancellationToken,
    poll_interval: Duration,
    next_job_id: Option<JobId>,
    in_flight: JoinSet<JobOutcome>,
}

impl Dispatcher {
    pub fn new(
        table: Arc<WorkerTable>,
        runner: JobRunner,
        events: broadcast::Sender<SchedulerEvent>,
        cancel: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            table,
            runner,
            events,
            cancel,
            poll_interval,
            next_job_id: Some(JobId::FIRST),
            in_flight: JoinSet::new(),
        }
    }

    /// Start the counter somewhere other than 1.
    pub fn with_first_job_id(mut self, id: JobId) -> Self {
        self.next_job_id = Some(id);
        self
    }

    /// Number of runner tasks that have not been reaped yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// One dispatch attempt.
    ///
    /// Claims the lowest idle slot, assigns it the next job id, emits
    /// `Assigned` and spawns the runner without waiting for it. Returns
    /// `Ok(None)` when the pool is full. Must be called from within a tokio
    /// runtime.
    pub fn dispatch_once(&mut self) -> Result<Option<Assignment>> {
        self.reap();

        let job_id = self.next_job_id.ok_or(SchedulerError::JobIdsExhausted)?;

        let Some(slot) = self.table.claim() else {
            tracing::debug!(busy = self.table.busy_count(), "No idle workers");
            return Ok(None);
        };
        let worker = slot.index();
        self.next_job_id = job_id.next();

        let job = Job::new(job_id, worker);
        tracing::info!(job_id = %job_id, worker, "Assigned job to worker");
        let _ = self.events.send(SchedulerEvent::Assigned {
            job_id,
            worker,
            at: Utc::now(),
        });

        let runner = self.runner.clone();
        let cancel = self.cancel.clone();
        self.in_flight.spawn(async move { runner.execute(slot, job, cancel).await });

        Ok(Some(Assignment { job_id, worker }))
    }

    /// Run the dispatch loop until cancelled.
    ///
    /// After a successful claim the loop sleeps a full polling interval. When
    /// the pool is full it sleeps at most one interval but wakes as soon as a
    /// slot is released. On cancellation it stops dispatching and waits for
    /// the in-flight runners, which observe the same token.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            pool_size = self.table.len(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Dispatch loop started"
        );

        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(());
            }
            let claimed = match self.dispatch_once() {
                Ok(assignment) => assignment.is_some(),
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch attempt failed");
                    break Err(e);
                }
            };
            if !pause(&self.cancel, &self.table, self.poll_interval, !claimed).await {
                break Ok(());
            }
        };

        self.drain().await;
        tracing::info!("Dispatch loop stopped");
        result
    }

    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Job runner task failed");
            }
        }
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Job runner task failed");
            }
        }
    }
}

/// Wait one polling interval. Returns false if cancelled meanwhile.
async fn pause(
    cancel: &CancellationToken,
    table: &WorkerTable,
    interval: Duration,
    wake_on_release: bool,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
        _ = table.released(), if wake_on_release => true,
    }
}
