//! Shared application state for request handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{AppConfig, FANOUT_CONNECT_TIMEOUT};
use crate::simulator::{LoadSimulator, WorkerPool};
use crate::store::EntityStore;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the configuration, the load simulator, the bounded worker pool
/// gating scenario endpoints, the in-memory entity store, and the HTTP client
/// used for internal fan-out requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub simulator: Arc<LoadSimulator>,
    pub pool: WorkerPool,
    pub store: Arc<EntityStore>,
    pub client: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates the application state from the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let pool = WorkerPool::new(config.pool.max_workers);
        let client = reqwest::Client::builder()
            .connect_timeout(FANOUT_CONNECT_TIMEOUT)
            .build()
            .expect("default reqwest client builder cannot fail");

        Self {
            config: Arc::new(config),
            simulator: Arc::new(LoadSimulator::new()),
            pool,
            store: Arc::new(EntityStore::new()),
            client,
            started_at: Utc::now(),
        }
    }

    /// Uptime since process start, formatted HH:MM:SS.
    pub fn uptime_string(&self) -> String {
        let secs = (Utc::now() - self.started_at).num_seconds().max(0);
        format!(
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    }
}
