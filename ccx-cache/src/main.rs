//! ccx-cache - Country Currency & Exchange cache service
//!
//! `ccx-cache serve` (default) runs the HTTP API.
//! `ccx-cache refresh` runs one refresh and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccx_cache::reconcile::RandomMultiplier;
use ccx_cache::sources::http::HttpSourceGateway;
use ccx_cache::{build_router, AppState, RefreshService};
use ccx_common::config::{resolve_config, ConfigOverrides};
use ccx_common::db::init_database;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ccx-cache
#[derive(Parser, Debug)]
#[command(name = "ccx-cache")]
#[command(about = "Country Currency & Exchange cache service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/ccx/config.toml when present)
    #[arg(short, long, global = true, env = "CCX_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Where the summary PNG is written
    #[arg(long, global = true)]
    artifact: Option<PathBuf>,

    /// Per-request timeout for upstream sources, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Run one refresh and exit
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccx_cache=info,ccx_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting ccx-cache v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = resolve_config(&ConfigOverrides {
        config_file: args.config,
        countries_url: None,
        rates_url: None,
        fetch_timeout_ms: args.timeout_ms,
        database_path: args.database,
        artifact_path: args.artifact,
        bind_addr: args.bind,
    })
    .context("Failed to resolve configuration")?;

    info!("Database path: {}", config.database_path.display());
    info!("Artifact path: {}", config.artifact_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let sources = HttpSourceGateway::from_config(&config)
        .context("Failed to build HTTP client for upstream sources")?;
    let refresher = RefreshService::new(
        pool.clone(),
        Arc::new(sources),
        Arc::new(RandomMultiplier),
        config.artifact_path.clone(),
    );

    if args.command == Some(Command::Refresh) {
        let result = refresher.refresh().await.context("Refresh failed")?;
        info!(
            "Refresh complete: {} countries at {} ({} inserted, {} updated, {} skipped)",
            result.total_records,
            result.timestamp.to_rfc3339(),
            result.inserted,
            result.updated,
            result.skipped
        );
        return Ok(());
    }

    let app = build_router(AppState::new(pool, refresher));

    let addr = config.socket_addr().context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("ccx-cache listening on http://{}", addr);
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
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
