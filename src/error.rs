use thiserror::Error;

use crate::scheduler::WorkerIndex;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Worker {0} released while already idle")]
    DoubleRelease(WorkerIndex),

    #[error("Worker index {index} out of range for pool of {pool_size}")]
    SlotOutOfRange {
        index: WorkerIndex,
        pool_size: usize,
    },

    #[error("Job id counter exhausted")]
    JobIdsExhausted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scheduler has been shut down")]
    AlreadyStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
