
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use jobslot::scheduler::{Job, JobId, JobOutcome, SchedulerEvent, WorkerState, WorkerTable};
use jobslot::worker::{JobHandler, JobRunner, SimulatedWork};
use test_harness::ScriptedWork;

/// Build a runner over `handler` next to an idle one-slot table.
fn runner_with_table(
    handler: Arc<dyn JobHandler>,
) -> (
    JobRunner,
    Arc<WorkerTable>,
    broadcast::Receiver<SchedulerEvent>,
) {
    let table = Arc::new(WorkerTable::new(1));
    let (tx, rx) = broadcast::channel(16);
    (JobRunner::new(handler, tx), table, rx)
}

#[tokio::test(start_paused = true)]
async fn test_simulated_work_succeeds_after_duration() {
    let handler = SimulatedWork::new(Duration::from_secs(5));
    assert_eq!(handler.duration(), Duration::from_secs(5));

    let start = tokio::time::Instant::now();
    handler.run(&Job::new(JobId(1), 0)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_execute_success_releases_then_reports() {
    let (runner, table, mut rx) =
        runner_with_table(Arc::new(SimulatedWork::new(Duration::from_secs(5))));
    let slot = table.claim().unwrap();

    let outcome = runner
        .execute(slot, Job::new(JobId(1), 0), CancellationToken::new())
        .await;

    assert_eq!(outcome, JobOutcome::Succeeded);
    assert_eq!(table.state(0), Some(WorkerState::Idle));

    match rx.try_recv().unwrap() {
        SchedulerEvent::Completed {
            job_id,
            worker,
            outcome,
            ..
        } => {
            assert_eq!(job_id, JobId(1));
            assert_eq!(worker, 0);
            assert_eq!(outcome, JobOutcome::Succeeded);
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(start_paused = true)]
async fn test_execute_reports_handler_error() {
    let handler = ScriptedWork::new(Duration::from_millis(10)).failing(4);
    let (runner, table, mut rx) = runner_with_table(Arc::new(handler));
    let slot = table.claim().unwrap();

    let outcome = runner
        .execute(slot, Job::new(JobId(4), 0), CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Failed {
            error: "scripted failure in job 4".to_string()
        }
    );
    assert_eq!(table.state(0), Some(WorkerState::Idle));
    assert!(matches!(
        rx.try_recv().unwrap(),
        SchedulerEvent::Completed {
            outcome: JobOutcome::Failed { .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_execute_catches_panic() {
    let handler = ScriptedWork::new(Duration::from_millis(10)).panicking(9);
    let (runner, table, _rx) = runner_with_table(Arc::new(handler));
    let slot = table.claim().unwrap();

    let outcome = runner
        .execute(slot, Job::new(JobId(9), 0), CancellationToken::new())
        .await;

    match outcome {
        JobOutcome::Failed { error } => {
            assert_eq!(error, "job panicked: scripted panic in job 9");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(table.state(0), Some(WorkerState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_execute_observes_cancellation() {
    let (runner, table, mut rx) =
        runner_with_table(Arc::new(SimulatedWork::new(Duration::from_secs(3600))));
    let slot = table.claim().unwrap();
    let cancel = CancellationToken::new();

    let task = {
        let runner = runner.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            runner
                .execute(slot, Job::new(JobId(2), 0), cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(table.state(0), Some(WorkerState::Busy));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), JobOutcome::Cancelled);
    assert_eq!(table.state(0), Some(WorkerState::Idle));
    assert!(matches!(
        rx.try_recv().unwrap(),
        SchedulerEvent::Completed {
            outcome: JobOutcome::Cancelled,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_aborted_runner_still_releases_slot() {
    let table = Arc::new(WorkerTable::new(1));
    let (tx, mut rx) = broadcast::channel(16);
    let runner = JobRunner::new(
        Arc::new(SimulatedWork::new(Duration::from_secs(3600))),
        tx.clone(),
    );
    let slot = table.claim().unwrap();

    let task = tokio::spawn(async move {
        runner
            .execute(slot, Job::new(JobId(3), 0), CancellationToken::new())
            .await
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    // Dropping the guard released the slot even though no event was sent
    assert_eq!(table.state(0), Some(WorkerState::Idle));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    drop(tx);
}

#[tokio::test]
async fn test_execute_without_subscribers() {
    let table = Arc::new(WorkerTable::new(1));
    let (tx, rx) = broadcast::channel(4);
    drop(rx);
    let runner = JobRunner::new(Arc::new(SimulatedWork::new(Duration::ZERO)), tx);

    let outcome = runner
        .execute(
            table.claim().unwrap(),
            Job::new(JobId(1), 0),
            CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(table.busy_count(), 0);
}
