//! Job execution for claimed worker slots.
//!
//! - [`JobHandler`]: the work a job performs ([`SimulatedWork`] by default)
//! - [`JobRunner`]: runs one handler invocation on a claimed slot, releases
//!   the slot on every exit path and emits the completion event
//!
//! # Execution Flow
//!
//! 1. The dispatcher claims a slot and spawns [`JobRunner::execute`]
//! 2. The handler runs, racing the shared cancellation token
//! 3. Errors and panics become [`JobOutcome::Failed`](crate::scheduler::JobOutcome)
//! 4. The slot returns to idle, then `Completed` is broadcast

pub mod executor;
pub mod runner;

pub use executor::{JobHandler, SimulatedWork};
pub use runner::JobRunner;
