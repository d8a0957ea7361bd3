//! Health and uptime endpoints for container orchestration.
//!
//! Liveness stays intentionally cheap: the handlers never touch the worker
//! pool or the contention lock, so probes keep passing while a chaos scenario
//! saturates the service.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SERVICE_NAME;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeResponse {
    pub started_at: DateTime<Utc>,
    pub uptime: String,
    pub current_time: DateTime<Utc>,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    tracing::info!("Health check endpoint called");
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        service: SERVICE_NAME,
    })
}

/// Process start time and formatted uptime, for restart monitoring.
pub async fn uptime(State(state): State<AppState>) -> Json<UptimeResponse> {
    Json(UptimeResponse {
        started_at: state.started_at,
        uptime: state.uptime_string(),
        current_time: Utc::now(),
    })
}
