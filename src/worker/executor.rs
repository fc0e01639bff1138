use std::time::Duration;

use async_trait::async_trait;

use crate::scheduler::Job;

/// The work performed for one job.
///
/// An `Err` marks the job as failed. Implementations may also panic; the
/// runner treats that as a failure and still releases the slot.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> Result<(), String>;
}

/// Stand-in for real work: waits a fixed duration and succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl JobHandler for SimulatedWork {
    async fn run(&self, job: &Job) -> Result<(), String> {
        tracing::debug!(
            job_id = %job.id,
            worker = job.worker,
            duration_ms = self.duration.as_millis() as u64,
            "Simulating job work"
        );
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}
