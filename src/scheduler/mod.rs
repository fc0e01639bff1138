pub mod dispatcher;
pub mod job;
pub mod table;

/// Position of a slot in the pool; doubles as the worker's identity.
pub type WorkerIndex = usize;

pub use dispatcher::{Assignment, Dispatcher};
pub use job::{Job, JobId, JobOutcome, SchedulerEvent};
pub use table::{SlotGuard, WorkerState, WorkerTable};
