//! faultline: a chaos-testing HTTP service.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration from a TOML file, builds the shared state (load simulator,
//! worker pool, entity store), spawns the heartbeat logging tasks, sets up
//! the Axum router, and starts the HTTP server with graceful shutdown.

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faultline::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use faultline::heartbeat::spawn_heartbeat_tasks;
use faultline::routes::create_router;
use faultline::state::AppState;

/// faultline: exercise worker exhaustion, hangs, and CPU saturation over HTTP
#[derive(Parser, Debug)]
#[command(name = "faultline", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "faultline=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load(&args.config)?;
    tracing::info!(
        host = %config.http.host,
        port = config.http.port,
        max_workers = config.pool.max_workers,
        heartbeat = config.heartbeat.enabled,
        "Loaded configuration"
    );

    // Create application state and background logging
    let state = AppState::new(config.clone());
    spawn_heartbeat_tasks(&state);

    // Create router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .expect("Invalid http.host or http.port in config");
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves when SIGTERM or Ctrl+C is received, draining in-flight requests.
/// In-flight scenario futures are dropped on shutdown; their cleanup guards
/// restore the contention bookkeeping before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
