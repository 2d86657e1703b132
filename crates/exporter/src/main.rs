//! Sales model exporter - Prometheus metrics for a deployed regression model
//!
//! Loads the trained sales model once, runs it on synthetic input every few
//! seconds, and serves inference statistics for Prometheus to scrape.

use anyhow::Result;
use clap::Parser;
use exporter_lib::{
    observability::StructuredLogger, service, ModelHandle, SyntheticFeatureGenerator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prometheus exporter for the sales prediction model
#[derive(Parser)]
#[command(name = "sales-model-exporter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./exporter.toml when present)
    #[arg(long, short, env = "EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the model artifact path
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Override the metrics port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let mut config = config::ExporterConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.model_path {
        config.model_path = path;
    }
    if let Some(port) = cli.port {
        config.metrics_port = port;
    }
    info!(
        model_path = %config.model_path.display(),
        port = config.metrics_port,
        "Exporter configured"
    );

    let logger = StructuredLogger::new(&config.instance);

    // Phase one: the model is loaded exactly once.
    let model = ModelHandle::load(&config.model_path, config.model_sha256.as_deref());

    // Phase two: only a loaded model gets a loop and a listener.
    let exporter = service::launch(
        model,
        Arc::new(SyntheticFeatureGenerator::new()),
        config.service_settings(),
    )
    .await?;

    logger.log_startup(
        EXPORTER_VERSION,
        &config.model_path.display().to_string(),
        exporter.local_addr().port(),
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    exporter.shutdown().await?;

    Ok(())
}
