//! Handlers for the failure-mode scenario endpoints.
//!
//! `block-thread` contends for the shared exclusive lock and can fan out to
//! saturate the whole worker pool, `hang` stalls a worker without locking,
//! `cpu-intensive` burns a core on the blocking pool, and `thread-status`
//! reports the live contention snapshot.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::{
    DEFAULT_BLOCK_SECONDS, DEFAULT_CPU_SECONDS, DEFAULT_HANG_SECONDS, FANOUT_TIMEOUT_FLOOR_SECS,
};
use crate::error::AppError;
use crate::simulator::{ContentionSnapshot, LoadSimulator};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BlockParams {
    #[serde(default = "default_block_seconds")]
    pub seconds: u64,
    #[serde(default)]
    pub internal: bool,
}

fn default_block_seconds() -> u64 {
    DEFAULT_BLOCK_SECONDS
}

#[derive(Debug, Deserialize)]
pub struct HangParams {
    #[serde(default = "default_hang_seconds")]
    pub seconds: u64,
}

fn default_hang_seconds() -> u64 {
    DEFAULT_HANG_SECONDS
}

#[derive(Debug, Deserialize)]
pub struct CpuParams {
    #[serde(default = "default_cpu_seconds")]
    pub seconds: u64,
}

fn default_cpu_seconds() -> u64 {
    DEFAULT_CPU_SECONDS
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub message: String,
    pub thread: String,
    pub duration: String,
    pub internal: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HangResponse {
    pub message: String,
    pub thread: String,
    pub duration: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuResponse {
    pub message: String,
    pub thread: String,
    pub iterations: u64,
    pub duration: String,
    pub result_checksum: u64,
}

/// Block a worker on the shared exclusive lock for the requested duration.
///
/// An external call (internal=false) first spawns `max_workers - 1` loopback
/// copies of itself with internal=true, so a single request exhausts the
/// bounded pool. Fan-out failures are logged and never fail this call.
#[instrument(name = "scenarios::block_thread", skip(state))]
pub async fn block_thread(
    State(state): State<AppState>,
    Query(params): Query<BlockParams>,
) -> Json<BlockResponse> {
    let caller = state.simulator.next_caller_id();
    tracing::warn!(
        caller = %caller,
        seconds = params.seconds,
        internal = params.internal,
        "POST /api/test/block-thread - blocking worker"
    );

    // Occupy one pool worker for the whole scenario.
    let _worker = state.pool.checkout().await;

    if !params.internal {
        spawn_fanout(&state, params.seconds);
    }

    state
        .simulator
        .block_for(Duration::from_secs(params.seconds), &caller)
        .await;

    Json(BlockResponse {
        message: format!("Thread was blocked for {} seconds", params.seconds),
        thread: caller,
        duration: format!("{}s", params.seconds),
        internal: params.internal,
    })
}

/// Issue the internal loopback requests that exhaust the remaining workers.
///
/// Fire-and-forget: each request runs on its own task, and a failure only
/// produces an error log.
fn spawn_fanout(state: &AppState, seconds: u64) {
    let to_spawn = state.config.pool.max_workers.saturating_sub(1);
    let timeout = Duration::from_secs(FANOUT_TIMEOUT_FLOOR_SECS.max(seconds.saturating_add(5)));

    for _ in 0..to_spawn {
        let client = state.client.clone();
        let url = format!(
            "http://127.0.0.1:{}/api/test/block-thread?seconds={}&internal=true",
            state.config.http.port, seconds
        );
        tokio::spawn(async move {
            if let Err(err) = client.post(&url).timeout(timeout).send().await {
                tracing::error!(error = %err, "Internal fan-out request failed");
            }
        });
    }

    tracing::info!(
        spawned = to_spawn,
        max_workers = state.config.pool.max_workers,
        "Spawned internal requests to exhaust worker pool"
    );
}

/// Stall a worker in a deadline-checking sleep loop, without taking any lock.
#[instrument(name = "scenarios::hang", skip(state))]
pub async fn hang(
    State(state): State<AppState>,
    Query(params): Query<HangParams>,
) -> Json<HangResponse> {
    let caller = state.simulator.next_caller_id();
    tracing::warn!(
        caller = %caller,
        seconds = params.seconds,
        "POST /api/test/hang - hanging worker"
    );

    let _worker = state.pool.checkout().await;

    let outcome = state
        .simulator
        .hang_for(Duration::from_secs(params.seconds), &caller)
        .await;

    Json(HangResponse {
        message: format!("Thread hung for {} seconds", params.seconds),
        thread: caller,
        duration: format!("{}s", params.seconds),
        completed_at: outcome.completed_at,
    })
}

/// Burn a CPU core with floating-point work for the requested duration.
#[instrument(name = "scenarios::cpu_intensive", skip(state))]
pub async fn cpu_intensive(
    State(state): State<AppState>,
    Query(params): Query<CpuParams>,
) -> Result<Json<CpuResponse>, AppError> {
    let caller = state.simulator.next_caller_id();
    tracing::warn!(
        caller = %caller,
        seconds = params.seconds,
        "POST /api/test/cpu-intensive - starting CPU burn"
    );

    let _worker = state.pool.checkout().await;

    let duration = Duration::from_secs(params.seconds);
    let outcome = tokio::task::spawn_blocking(move || LoadSimulator::burn_cpu(duration))
        .await
        .map_err(|err| AppError::Internal(format!("CPU burn task failed: {}", err)))?;

    tracing::info!(
        caller = %caller,
        iterations = outcome.iterations,
        elapsed_secs = outcome.elapsed.as_secs(),
        "CPU intensive task completed"
    );

    Ok(Json(CpuResponse {
        message: "CPU intensive task completed".to_string(),
        thread: caller,
        iterations: outcome.iterations,
        duration: format!("{}s", outcome.elapsed.as_secs()),
        result_checksum: outcome.checksum,
    }))
}

/// Report the current contention snapshot. Never blocks on the lock and never
/// consumes a pool worker, so it stays responsive during full saturation.
#[instrument(name = "scenarios::thread_status", skip(state))]
pub async fn thread_status(State(state): State<AppState>) -> Json<ContentionSnapshot> {
    tracing::info!("GET /api/test/thread-status - checking contention state");
    Json(state.simulator.snapshot())
}
