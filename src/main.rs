// Limpha - memory daemon entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use limpha::models::session::SessionHandle;
use limpha::services::daemon::{DaemonContext, MemoryDaemon};
use limpha::services::memory::{MemoryEngine, ShardExporter};
use limpha::storage::{ConfigService, Database};

/// Durable conversational memory served over a Unix socket
#[derive(Parser)]
#[command(name = "limpha-daemon", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, env = "LIMPHA_CONFIG")]
    config: Option<PathBuf>,

    /// Database file
    #[arg(long, env = "LIMPHA_DB")]
    db: Option<PathBuf>,

    /// Socket path
    #[arg(long, env = "LIMPHA_SOCKET")]
    socket: Option<PathBuf>,

    /// Directory for shard artifacts
    #[arg(long, env = "LIMPHA_SHARD_DIR")]
    shard_dir: Option<PathBuf>,

    /// Connection pool size
    #[arg(long, env = "LIMPHA_POOL_SIZE")]
    pool_size: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LIMPHA_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let service = match &cli.config {
        Some(path) => ConfigService::load_or_create(
            path,
            limpha::models::settings::LimphaConfig::with_default_paths()?,
        ),
        None => ConfigService::new(),
    }
    .context("Failed to load configuration")?;
    let config_file = service.path().to_path_buf();

    let mut config = service.into_config();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(shard_dir) = cli.shard_dir {
        config.shard_dir = shard_dir;
    }
    if let Some(pool_size) = cli.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    init_logging(&config.log_level)?;
    info!(config = %config_file.display(), "Loaded configuration");

    let db = Database::open(&config.db_path, config.pool_size)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    let engine = MemoryEngine::open(db, SessionHandle::generate())?;
    let exporter = ShardExporter::new(&config.shard_dir);

    let daemon = MemoryDaemon::new(&config.socket_path, DaemonContext::new(engine, exporter));
    let token = daemon.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });

    daemon.run().await.context("Memory daemon failed")?;
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
