//! pb-api - PureBreath analysis persistence and history server
//!
//! Serves:
//! - POST /api/analysis/save
//! - GET  /api/analysis/history/:user_id
//! - GET  /health, /api/ping, /api/buildinfo

use anyhow::{Context, Result};
use clap::Parser;
use pb_common::config::{load_config, resolve_config_path, StorageBackend};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pb_api::{build_router, store, AppState};

/// Command-line arguments for pb-api
#[derive(Parser, Debug)]
#[command(name = "pb-api")]
#[command(about = "Analysis persistence and history server for PureBreath")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "PB_BIND")]
    bind: Option<String>,

    /// Storage backend: sqlite or memory
    #[arg(short, long, env = "PB_STORAGE")]
    storage: Option<StorageBackend>,

    /// SQLite database file
    #[arg(short, long, env = "PB_DATABASE")]
    database: Option<PathBuf>,

    /// Message returned by /api/ping
    #[arg(long, env = "PB_PING_MESSAGE")]
    ping_message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pb_api={0},pb_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any storage delays
    info!(
        "Starting PureBreath API (pb-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => warn!("No config file found, using defaults"),
    }

    // CLI / environment overrides
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = backend;
    }
    if let Some(database) = args.database {
        config.storage.database_path = Some(database);
    }
    if let Some(message) = args.ping_message {
        config.server.ping_message = message;
    }

    let store = store::open_store(&config.storage)
        .await
        .context("Failed to open analysis store")?;
    let degraded = store.backend() != config.storage.backend;
    if degraded {
        warn!("Running in degraded mode: analyses will not survive a restart");
    }

    let state = AppState::new(store)
        .with_ping_message(config.server.ping_message.as_str())
        .with_degraded(degraded);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!("pb-api listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
