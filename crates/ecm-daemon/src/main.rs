//! ecm-daemon - Enhanced Confirmation Mode service daemon.
//!
//! Loads the ECM configuration and device inventory, opens the app-ops
//! database and serves the ECM socket until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ecm_core::config::EcmConfig;
use ecm_core::platform::inventory::DeviceInventory;
use ecm_daemon::app_ops_db::SqliteAppOpsStore;
use ecm_daemon::protocol::{ProtocolServer, RequestDispatcher, ServerConfig};
use ecm_daemon::{EnhancedConfirmationService, platform_from_inventory};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Enhanced Confirmation Mode daemon
#[derive(Parser, Debug)]
#[command(name = "ecm-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ECM configuration file
    #[arg(short, long, default_value = "/etc/ecm/ecm.toml")]
    config: PathBuf,

    /// Override the socket path from the configuration
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override the device inventory path from the configuration
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Override the app-ops database path from the configuration
    #[arg(long)]
    app_ops_db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

async fn shutdown_signal(mut sigterm: Signal, mut sigint: Signal) {
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = EcmConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    if let Some(socket) = args.socket {
        config.daemon.socket_path = socket;
    }
    if let Some(inventory) = args.inventory {
        config.daemon.inventory = inventory;
    }
    if let Some(app_ops_db) = args.app_ops_db {
        config.daemon.app_ops_db = app_ops_db;
    }

    let inventory = DeviceInventory::from_file(&config.daemon.inventory).with_context(|| {
        format!(
            "failed to load inventory {}",
            config.daemon.inventory.display()
        )
    })?;
    if let Some(parent) = config.daemon.app_ops_db.parent() {
        std::fs::create_dir_all(parent).context("failed to create app-ops directory")?;
    }
    let app_ops = SqliteAppOpsStore::open(&config.daemon.app_ops_db)
        .context("failed to open app-ops database")?;
    info!(
        users = inventory.users.len(),
        packages = inventory.packages.len(),
        "device inventory loaded"
    );

    let platform = platform_from_inventory(&inventory, Arc::new(app_ops));
    let service = EnhancedConfirmationService::start(&config, platform)
        .context("failed to start enhanced confirmation service")?;

    let server = ProtocolServer::bind(ServerConfig::new(
        &config.daemon.socket_path,
        config.daemon.socket_mode,
    ))
    .context("failed to bind ECM socket")?;
    let sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
    server
        .serve(
            RequestDispatcher::new(Arc::new(service)),
            shutdown_signal(sigterm, sigint),
        )
        .await
        .context("ECM socket server failed")?;

    info!("ecm-daemon stopped");
    Ok(())
}
