//! feedmirror-sync - feed mirroring service
//!
//! Authenticates against the feed provider on the user's behalf, keeps the
//! session's tokens fresh, and mirrors the friend feed into SQLite.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use feedmirror_common::config::AppConfig;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedmirror_sync::api::SessionCodec;
use feedmirror_sync::upstream::HttpUpstream;
use feedmirror_sync::AppState;

/// Command-line arguments for feedmirror-sync
#[derive(Parser, Debug)]
#[command(name = "feedmirror-sync")]
#[command(about = "Feed mirroring service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "FEEDMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides configuration)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    // RUST_LOG wins over the configured level
    let default_filter = format!(
        "feedmirror_sync={level},feedmirror_common={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting feedmirror-sync (Version {}, Build {}, Built {}, Profile {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config.validate().context("Invalid configuration")?;

    info!("Database: {}", config.database.path.display());
    let db = feedmirror_common::db::init_database(&config.database.path)
        .await
        .context("Failed to initialize database")?;

    let upstream = HttpUpstream::new(config.provider.clone()).context("Failed to create upstream client")?;
    info!(
        base_url = %config.provider.api_base_url,
        requests_per_second = config.provider.requests_per_second,
        "Upstream client ready"
    );

    let sessions = SessionCodec::new(&config.session).context("Failed to set up session cookies")?;

    if config.server.api_key.is_none() {
        warn!("No API key configured: all /api/v1 requests will be refused");
    }

    let state = AppState::new(
        db,
        Arc::new(upstream),
        sessions,
        config.server.api_key.clone(),
        config.database.max_lock_wait_ms,
    );
    let app = feedmirror_sync::build_router(state);

    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid server host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

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
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
