//! aquawatch-detect - Water anomaly detection service
//!
//! Fetches gauge readings, asks the prediction endpoint for the expected
//! value and flags sites whose readings deviate beyond the configured
//! threshold.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use aquawatch_common::config::{resolve_config_path, TomlConfig};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use aquawatch_detect::pipeline::Detector;
use aquawatch_detect::AppState;

/// Command-line arguments for aquawatch-detect
#[derive(Parser, Debug)]
#[command(name = "aquawatch-detect")]
#[command(about = "Water gauge anomaly detection service")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overrides the config file
    #[arg(short, long, env = "AQUAWATCH_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing before the config is read so its warnings are visible;
    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| default_filter("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    if !from_env {
        filter_handle
            .reload(default_filter(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    info!("Starting aquawatch-detect v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }
    if config.inference.endpoint.is_none() || config.inference.target_model.is_none() {
        warn!("Inference endpoint or target model not configured; detection requests will fail");
    }

    let detector = Detector::from_config(&config).context("Failed to build detection pipeline")?;
    let app = aquawatch_detect::build_router(AppState::new(Arc::new(detector)));

    let port = args.port.unwrap_or(config.server.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

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

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "aquawatch_detect={level},aquawatch_common={level},tower_http={level}"
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
