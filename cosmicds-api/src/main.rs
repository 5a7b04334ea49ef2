//! cosmicds-api - CosmicDS educational data service
//!
//! Resolves configuration, opens the database, sets up every story and
//! serves the HTTP API until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cosmicds_api::stories::default_registry;
use cosmicds_api::{build_router, AppState};
use cosmicds_common::config::{ServerConfig, TomlConfig};
use cosmicds_common::db::init_database;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for cosmicds-api
#[derive(Parser, Debug)]
#[command(name = "cosmicds-api")]
#[command(about = "CosmicDS educational data service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "CDS_API_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "CDS_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "CDS_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Browser origin admitted without an API key (repeatable)
    #[arg(long = "allowed-origin", env = "CDS_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "CDS_API_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => TomlConfig::load_default(),
    };
    let config = ServerConfig::resolve(
        args.port,
        args.database,
        args.allowed_origins,
        args.log_level,
        toml,
    );

    let level = &config.log_level;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "cosmicds_api={0},cosmicds_common={0},tower_http={0}",
                level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CosmicDS API v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let stories = default_registry().context("Failed to build story registry")?;
    stories
        .setup_all(&pool)
        .await
        .context("Failed to set up stories")?;
    info!("Stories: {}", stories.names().join(", "));

    info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let state = AppState::new(pool, config.allowed_origins, stories);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("cosmicds-api listening on http://{}", addr);

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
