//! Now Playing Server - standalone headless relay.
//!
//! Reads the AirPlay metadata pipe (and optionally a scripted demo source),
//! reconciles everything into one session record and serves it to display
//! clients as length-prefixed JSON frames over TCP.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nowplaying_core::bootstrap_services;
use tokio::signal;

use crate::config::ServerConfig;

/// Now Playing Server - unified "now playing" state for display clients.
#[derive(Parser, Debug)]
#[command(name = "nowplaying-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "NOWPLAYING_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Subscriber port (overrides config file).
    #[arg(short = 'p', long, env = "NOWPLAYING_TCP_PORT")]
    port: Option<u16>,

    /// Metadata pipe path (overrides config file).
    #[arg(long, env = "NOWPLAYING_PIPE_PATH")]
    pipe_path: Option<PathBuf>,

    /// Run the scripted demo source.
    #[arg(long)]
    mock: bool,

    /// Do not read the metadata pipe.
    #[arg(long)]
    no_pipe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Now Playing Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.tcp_port = port;
    }
    if let Some(pipe_path) = args.pipe_path {
        config.pipe_path = pipe_path;
    }
    if args.mock {
        config.enable_mock = true;
    }
    if args.no_pipe {
        config.enable_pipe = false;
    }

    log::info!(
        "Configuration: listen={}:{}, pipe={}, art_cache={}",
        config.bind_host,
        config.tcp_port,
        if config.enable_pipe {
            config.pipe_path.display().to_string()
        } else {
            "off".to_string()
        },
        config.art_cache_dir.display()
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let addr = services
        .start_background_tasks()
        .await
        .with_context(|| format!("Failed to listen on {}", core_config.bind_addr()))?;

    log::info!("Serving subscribers on {}", addr);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
