use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, SchedulerError};

/// Configuration for the worker pool and its dispatch loop.
///
/// Intervals are in milliseconds. The defaults reproduce a pool of four
/// workers polled once per second, each job taking five seconds.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker slots in the pool
    pub pool_size: usize,
    /// Delay between two dispatch attempts
    pub poll_interval_ms: u64,
    /// Duration of the simulated work performed by each job
    pub job_duration_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            poll_interval_ms: 1000,
            job_duration_ms: 5000,
            event_buffer: 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_job_duration_ms(mut self, ms: u64) -> Self {
        self.job_duration_ms = ms;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_duration(&self) -> Duration {
        Duration::from_millis(self.job_duration_ms)
    }

    /// Reject settings the dispatch loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(SchedulerError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        // broadcast::channel panics on a zero capacity
        if self.event_buffer == 0 {
            return Err(SchedulerError::InvalidConfig(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the HTTP control surface.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:5000"
                .parse()
                .expect("default listen address is valid"),
        }
    }
}
