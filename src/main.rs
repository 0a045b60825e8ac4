//! CLI entry point for the stream collector.

use anyhow::{Context, Result};
use clap::Parser;
use collector_core::pipeline::shutdown_signal;
use collector_core::{CollectorConfig, FileDriver, StreamReader, collect};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > --log-level > default (warning)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level.as_filter()));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = CollectorConfig::resolve(
        &args.credentials,
        args.output_path.clone(),
        args.parameters.clone().unwrap_or_default(),
        args.max_file_size,
    )
    .context("invalid configuration")?;

    debug!(?config, "configuration resolved");

    let reader = StreamReader::new(config.token.clone(), config.parameters.clone())
        .context("failed to create stream reader")?;
    let driver = FileDriver::new(&config.output_folder, config.max_file_size)
        .with_context(|| format!("cannot write to {}", config.output_folder.display()))?;

    info!(
        output = %driver.root().display(),
        max_file_size = driver.max_file_size(),
        "Collector starting"
    );

    let shutdown = shutdown_signal().context("failed to install signal handlers")?;

    let summary = collect(&reader, &driver, shutdown)
        .await
        .context("collection stopped")?;

    info!(
        records = summary.records,
        bytes = summary.bytes,
        files_opened = summary.files_opened,
        last_index = summary.last_index,
        "Collection complete"
    );

    Ok(())
}
