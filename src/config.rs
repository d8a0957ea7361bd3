//! Configuration loading and constants.
//!
//! Loads application configuration from a TOML file and defines constants for
//! scenario defaults, heartbeat intervals, and logging. Every field carries a
//! serde default, so the config file is optional: a missing file at the
//! default path falls back to built-in defaults, while an explicitly given
//! path must exist.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Service name reported in health responses and heartbeat logs.
pub const SERVICE_NAME: &str = "faultline";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set.
pub const DEFAULT_LOG_FILTER: &str = "faultline=debug,tower_http=info";

// =============================================================================
// Scenario Defaults
// =============================================================================

/// Default hold duration for block-thread, in seconds.
pub const DEFAULT_BLOCK_SECONDS: u64 = 30;

/// Default stall duration for hang, in seconds.
pub const DEFAULT_HANG_SECONDS: u64 = 90;

/// Default burn duration for cpu-intensive, in seconds.
pub const DEFAULT_CPU_SECONDS: u64 = 10;

/// Step size of the hang loop. The loop sleeps at most this long before
/// re-checking its deadline, so cancellation is observed promptly.
pub const HANG_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Emit a cpu-burn progress log every this many iterations.
pub const CPU_BURN_LOG_EVERY: u64 = 1_000_000;

/// Floor for the fan-out request timeout, in seconds. The effective timeout
/// is `max(FANOUT_TIMEOUT_FLOOR_SECS, seconds + 5)`.
pub const FANOUT_TIMEOUT_FLOOR_SECS: u64 = 5;

/// Connect timeout for the internal fan-out HTTP client.
pub const FANOUT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Heartbeat Intervals
// =============================================================================

/// Heartbeat counter log interval, in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// System status log interval, in seconds.
pub const SYSTEM_STATUS_INTERVAL_SECS: u64 = 60;

/// Entity store status log interval, in seconds.
pub const STORE_STATUS_INTERVAL_SECS: u64 = 120;

/// Detailed status log interval, in seconds.
pub const DETAILED_STATUS_INTERVAL_SECS: u64 = 300;

// =============================================================================
// HTTP Response Headers
// =============================================================================

/// Status endpoints must always be fresh; never let an intermediary cache
/// a contention snapshot or health probe.
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Bounded worker pool for scenario endpoints
    #[serde(default)]
    pub pool: PoolConfig,
    /// Scheduled heartbeat logging
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// Worker pool configuration.
///
/// `max_workers` is the concurrency bound for scenario endpoints and the
/// fan-out width of block-thread: one external call spawns `max_workers - 1`
/// internal calls to saturate the pool.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "PoolConfig::default_max_workers")]
    pub max_workers: usize,
}

impl PoolConfig {
    fn default_max_workers() -> usize {
        5
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: Self::default_max_workers(),
        }
    }
}

/// Heartbeat logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "HeartbeatConfig::default_enabled")]
    pub enabled: bool,
}

impl HeartbeatConfig {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file at the default path yields the built-in defaults; a
    /// missing file at an explicitly chosen path is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            if path == Path::new(DEFAULT_CONFIG_PATH) {
                tracing::info!("No config file found, using defaults");
                return Self::default().validate();
            }
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.pool.max_workers == 0 {
            return Err(ConfigError::Validation(
                "pool.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
