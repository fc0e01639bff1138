use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::scheduler::{Dispatcher, SchedulerEvent, WorkerTable};
use crate::worker::{JobHandler, JobRunner, SimulatedWork};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Default)]
enum DispatchState {
    #[default]
    NotStarted,
    Running(JoinHandle<Result<()>>),
    Stopped,
}

/// Owns the worker table and the single dispatch loop that feeds it.
///
/// The table, the event channel and the cancellation token are created
/// here and handed to the dispatcher and every runner; nothing is global.
/// Starting is idempotent: at most one dispatch loop ever runs against a
/// table, so job ids stay unique.
pub struct Node {
    pub config: SchedulerConfig,
    table: Arc<WorkerTable>,
    events: broadcast::Sender<SchedulerEvent>,
    handler: Arc<dyn JobHandler>,
    cancel: CancellationToken,
    stopped: CancellationToken,
    dispatch: Mutex<DispatchState>,
}

impl Node {
    /// Create a node whose jobs run [`SimulatedWork`] for the configured
    /// job duration.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let handler = Arc::new(SimulatedWork::new(config.job_duration()));
        Self::with_handler(config, handler)
    }

    pub fn with_handler(config: SchedulerConfig, handler: Arc<dyn JobHandler>) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            table: Arc::new(WorkerTable::new(config.pool_size)),
            events,
            handler,
            cancel: CancellationToken::new(),
            stopped: CancellationToken::new(),
            dispatch: Mutex::new(DispatchState::default()),
            config,
        })
    }

    fn dispatch(&self) -> MutexGuard<'_, DispatchState> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the dispatch loop in the background and return immediately.
    ///
    /// Repeat calls while running are no-ops reporting
    /// [`StartOutcome::AlreadyRunning`]. A node whose loop has ended, by
    /// shutdown, cancellation or error, cannot be started again. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) -> Result<StartOutcome> {
        let mut dispatch = self.dispatch();
        match &*dispatch {
            DispatchState::Running(handle) if !handle.is_finished() => {
                tracing::debug!("Dispatch loop already running");
                return Ok(StartOutcome::AlreadyRunning);
            }
            DispatchState::Running(_) | DispatchState::Stopped => {
                return Err(SchedulerError::AlreadyStopped)
            }
            DispatchState::NotStarted => {}
        }

        let runner = JobRunner::new(self.handler.clone(), self.events.clone());
        let dispatcher = Dispatcher::new(
            self.table.clone(),
            runner,
            self.events.clone(),
            self.cancel.clone(),
            self.config.poll_interval(),
        );
        let stopped = self.stopped.clone();
        *dispatch = DispatchState::Running(tokio::spawn(async move {
            let _stopped = stopped.drop_guard();
            dispatcher.run().await
        }));

        tracing::info!(
            pool_size = self.config.pool_size,
            poll_interval_ms = self.config.poll_interval_ms,
            job_duration_ms = self.config.job_duration_ms,
            "Started continuous job assignment"
        );
        Ok(StartOutcome::Started)
    }

    /// True while the dispatch loop task is alive.
    pub fn is_running(&self) -> bool {
        matches!(&*self.dispatch(), DispatchState::Running(handle) if !handle.is_finished())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn table(&self) -> &Arc<WorkerTable> {
        &self.table
    }

    /// Resolves once the dispatch loop has ended for any reason, or once
    /// the node is shut down without ever starting.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await
    }

    /// Token observed by the dispatch loop and every runner.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the dispatch loop and in-flight jobs, then wait for them.
    ///
    /// Every slot is idle once this returns. Returns the error the loop
    /// stopped with, if any.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        let previous = std::mem::replace(&mut *self.dispatch(), DispatchState::Stopped);

        let DispatchState::Running(handle) = previous else {
            self.stopped.cancel();
            return Ok(());
        };

        tracing::info!("Shutting down dispatch loop");
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(SchedulerError::Internal(format!(
                "dispatch task failed: {}",
                e
            ))),
        }
    }
}
