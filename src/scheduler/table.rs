use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{Result, SchedulerError};
use crate::scheduler::WorkerIndex;

/// Busy/idle state of a single worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Busy,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Busy => write!(f, "busy"),
        }
    }
}

/// Fixed-size table of worker slots.
///
/// All reads and writes go through one mutex, so the lowest-index scan and
/// the Idle -> Busy transition of [`WorkerTable::try_claim_idle`] form a
/// single critical section. The lock is never held across an `.await`.
#[derive(Debug)]
pub struct WorkerTable {
    slots: Mutex<Vec<WorkerState>>,
    released: Notify,
}

impl WorkerTable {
    /// Create a table with `pool_size` idle slots.
    pub fn new(pool_size: usize) -> Self {
        Self {
            slots: Mutex::new(vec![WorkerState::Idle; pool_size]),
            released: Notify::new(),
        }
    }

    // A panic while holding the lock cannot leave a slot half-written, so a
    // poisoned table is still consistent.
    fn slots(&self) -> MutexGuard<'_, Vec<WorkerState>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of slots in the pool
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Claim the lowest-index idle slot, marking it busy.
    ///
    /// Returns `None` when every slot is busy. That is the normal outcome of
    /// a full pool, not an error.
    pub fn try_claim_idle(&self) -> Option<WorkerIndex> {
        let mut slots = self.slots();
        let index = slots.iter().position(|s| *s == WorkerState::Idle)?;
        slots[index] = WorkerState::Busy;
        Some(index)
    }

    /// Claim the lowest-index idle slot and wrap it in a guard that releases
    /// it when dropped.
    pub fn claim(self: &Arc<Self>) -> Option<SlotGuard> {
        self.try_claim_idle().map(|index| SlotGuard {
            table: Arc::clone(self),
            index,
            released: false,
        })
    }

    /// Return a busy slot to idle and wake a waiting dispatcher.
    ///
    /// Releasing an idle slot is a dispatch bug and is rejected without
    /// touching the table.
    pub fn release(&self, index: WorkerIndex) -> Result<()> {
        {
            let mut slots = self.slots();
            let pool_size = slots.len();
            let slot = slots
                .get_mut(index)
                .ok_or(SchedulerError::SlotOutOfRange { index, pool_size })?;
            if *slot == WorkerState::Idle {
                tracing::error!(worker = index, "Release of an idle worker slot");
                return Err(SchedulerError::DoubleRelease(index));
            }
            *slot = WorkerState::Idle;
        }
        self.released.notify_one();
        Ok(())
    }

    pub fn state(&self, index: WorkerIndex) -> Option<WorkerState> {
        self.slots().get(index).copied()
    }

    /// Point-in-time copy of every slot state, ordered by index
    pub fn snapshot(&self) -> Vec<WorkerState> {
        self.slots().clone()
    }

    pub fn busy_count(&self) -> usize {
        self.slots()
            .iter()
            .filter(|s| **s == WorkerState::Busy)
            .count()
    }

    pub fn idle_count(&self) -> usize {
        self.slots()
            .iter()
            .filter(|s| **s == WorkerState::Idle)
            .count()
    }

    /// Wait until a slot is released.
    ///
    /// A release that happened while nobody was waiting is remembered, so the
    /// next call returns immediately.
    pub async fn released(&self) {
        self.released.notified().await;
    }
}

/// Ownership of one claimed slot.
///
/// The slot is released exactly once: either explicitly through
/// [`SlotGuard::release`] or when the guard is dropped, including during
/// unwinding and task cancellation.
#[derive(Debug)]
pub struct SlotGuard {
    table: Arc<WorkerTable>,
    index: WorkerIndex,
    released: bool,
}

impl SlotGuard {
    pub fn index(&self) -> WorkerIndex {
        self.index
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.table.release(self.index)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.table.release(self.index) {
                tracing::error!(worker = self.index, error = %e, "Failed to release worker slot");
            }
        }
    }
}
