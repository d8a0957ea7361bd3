//! Scheduled heartbeat and status logging.
//!
//! Background interval tasks that periodically log liveness and resource
//! state, so log pipelines and restart monitors have a steady signal to
//! correlate chaos scenarios against. All tasks are gated by the
//! `heartbeat.enabled` config flag and die with the runtime on shutdown.

use std::time::Duration;

use crate::config::{
    DETAILED_STATUS_INTERVAL_SECS, HEARTBEAT_INTERVAL_SECS, SERVICE_NAME,
    STORE_STATUS_INTERVAL_SECS, SYSTEM_STATUS_INTERVAL_SECS,
};
use crate::state::AppState;

/// Spawn all scheduled logging tasks. No-op when disabled in config.
pub fn spawn_heartbeat_tasks(state: &AppState) {
    if !state.config.heartbeat.enabled {
        tracing::info!("Scheduled heartbeat logging disabled");
        return;
    }

    tokio::spawn(heartbeat_loop(state.clone()));
    tokio::spawn(system_status_loop(state.clone()));
    tokio::spawn(store_status_loop(state.clone()));
    tokio::spawn(detailed_status_loop(state.clone()));
}

async fn heartbeat_loop(state: AppState) {
    let mut ticks = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    let mut count: u64 = 0;
    loop {
        ticks.tick().await;
        count += 1;
        let workers = tokio::runtime::Handle::current().metrics().num_workers();
        tracing::info!(
            count,
            active_workers = workers,
            uptime = %state.uptime_string(),
            "Application heartbeat"
        );
    }
}

async fn system_status_loop(state: AppState) {
    let mut ticks = tokio::time::interval(Duration::from_secs(SYSTEM_STATUS_INTERVAL_SECS));
    loop {
        ticks.tick().await;
        let metrics = tokio::runtime::Handle::current().metrics();
        let (waiting, holding) = state.simulator.active_callers();
        tracing::info!(
            alive_tasks = metrics.num_alive_tasks(),
            pool_available = state.pool.available(),
            pool_size = state.pool.size(),
            lock_waiting = waiting,
            lock_holding = holding,
            "System status"
        );
    }
}

async fn store_status_loop(state: AppState) {
    let mut ticks = tokio::time::interval(Duration::from_secs(STORE_STATUS_INTERVAL_SECS));
    loop {
        ticks.tick().await;
        tracing::info!(entities = state.store.count(), "Entity store status");
    }
}

async fn detailed_status_loop(state: AppState) {
    let mut ticks = tokio::time::interval(Duration::from_secs(DETAILED_STATUS_INTERVAL_SECS));
    loop {
        ticks.tick().await;
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        tracing::info!(
            service = SERVICE_NAME,
            version = env!("CARGO_PKG_VERSION"),
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            available_parallelism = parallelism,
            uptime = %state.uptime_string(),
            "Detailed system status"
        );
    }
}
