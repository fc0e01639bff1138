//! HTTP control surface: the start trigger plus read-only pool status.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::SchedulerError;
use crate::node::{Node, StartOutcome};
use crate::scheduler::WorkerState;

#[derive(Clone)]
pub struct ControlState {
    pub node: Arc<Node>,
}

#[derive(Serialize)]
struct WorkerResponse {
    index: usize,
    state: WorkerState,
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    pool_size: usize,
    busy: usize,
    idle: usize,
}

pub fn router(state: ControlState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start", get(start_handler))
        .route("/api/workers", get(workers_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the control routes until `shutdown` is cancelled.
pub async fn run_control(
    addr: SocketAddr,
    state: ControlState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting control server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

async fn start_handler(State(state): State<ControlState>) -> impl IntoResponse {
    match state.node.start() {
        Ok(StartOutcome::Started) => (
            StatusCode::OK,
            "Started continuous job assignment!\n".to_string(),
        ),
        Ok(StartOutcome::AlreadyRunning) => (
            StatusCode::OK,
            "Job assignment already running\n".to_string(),
        ),
        Err(SchedulerError::AlreadyStopped) => (
            StatusCode::CONFLICT,
            "Scheduler has been shut down\n".to_string(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to start job assignment");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
        }
    }
}

async fn workers_handler(State(state): State<ControlState>) -> impl IntoResponse {
    let workers: Vec<WorkerResponse> = state
        .node
        .table()
        .snapshot()
        .into_iter()
        .enumerate()
        .map(|(index, state)| WorkerResponse { index, state })
        .collect();

    Json(workers)
}

async fn status_handler(State(state): State<ControlState>) -> impl IntoResponse {
    let slots = state.node.table().snapshot();
    let busy = slots.iter().filter(|s| **s == WorkerState::Busy).count();

    Json(StatusResponse {
        running: state.node.is_running(),
        pool_size: slots.len(),
        busy,
        idle: slots.len() - busy,
    })
}
