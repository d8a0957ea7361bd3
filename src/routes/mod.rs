//! HTTP route handlers for the chaos-testing API.
//!
//! Routes split into three groups: scenario endpoints that occupy a bounded
//! pool worker for their full duration, status endpoints that bypass the pool
//! so contention stays observable mid-saturation, and the demo CRUD resource.
//! Status responses carry `Cache-Control: no-store` so probes and snapshots
//! are never served stale by an intermediary.
//!
//! Request tracing is enabled via middleware that generates a unique request
//! ID for each incoming request, allowing correlation of all logs within a
//! request.

pub mod entities;
pub mod health;
pub mod scenarios;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_NO_STORE;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Scenario endpoints - each checks out a worker pool permit for the
    // duration of the simulated failure.
    let scenario_routes = Router::new()
        .route("/api/test/block-thread", post(scenarios::block_thread))
        .route("/api/test/hang", post(scenarios::hang))
        .route("/api/test/cpu-intensive", post(scenarios::cpu_intensive));

    // Status endpoints - pool-exempt and never cached.
    let status_routes = Router::new()
        .route("/api/test/thread-status", get(scenarios::thread_status))
        .route("/api/test/health", get(health::health))
        .route("/api/test/uptime", get(health::uptime))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ));

    // Demo CRUD resource
    let entity_routes = Router::new()
        .route(
            "/api/entities",
            get(entities::list).post(entities::create),
        )
        .route("/api/entities/search", get(entities::search))
        .route(
            "/api/entities/{id}",
            get(entities::get_by_id)
                .put(entities::update)
                .delete(entities::remove),
        );

    Router::new()
        .merge(scenario_routes)
        .merge(status_routes)
        .merge(entity_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
