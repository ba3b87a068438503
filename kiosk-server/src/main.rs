//! # Kiosk Server
//!
//! Serves randomized, deduplicated screens to photo-frame style displays.
//!
//! ## Overview
//!
//! - **Selection**: weighted or uniform choice across people, albums, date
//!   ranges, favourites and memories
//! - **No repeats**: per-display batches are drained instead of re-queried
//! - **Prefetch**: the next screen is rendered in the background
//! - **History**: clients carry their own history to step back through

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kiosk_config::{ConfigLoad, ConfigLoader};
use kiosk_server::{infra::startup, routes};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "kiosk-server")]
#[command(about = "Prefetching asset server for kiosk displays")]
struct Cli {
    /// Path to a kiosk.toml (defaults to ./kiosk.toml or ./config/kiosk.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,kiosk_core=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let state = startup::build_state(&config)?;
    let orchestrator = state.orchestrator.clone();
    let maintenance = orchestrator.spawn_maintenance();
    let router = routes::create_app(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.server.host, config.server.port
                )
            })?;
    info!(
        "Starting kiosk server on {}:{}",
        config.server.host, config.server.port
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    for handle in maintenance {
        if let Err(err) = handle.await {
            warn!(error = %err, "cache sweeper ended abnormally");
        }
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
