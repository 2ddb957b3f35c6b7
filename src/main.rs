//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `sensor_bridge` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Printing status reports as JSON lines on stdout
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sensor_bridge::initialization::{
    init_logger_with, init_source, init_storage_client, StorageBackend,
};
use sensor_bridge::{
    cancel_on_ctrl_c, run_bridge, shutdown_gracefully, Config, Opt, RunSummary, StatusReport,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows keeping storage credentials out of the command line
    if dotenvy::dotenv().is_err() {
        // If .env not found in current dir, try next to the executable
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let config: Config = Opt::parse().into();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let (tx, mut rx) = mpsc::unbounded_channel::<StatusReport>();
    let printer = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => log::warn!("Failed to serialize status report: {e}"),
            }
        }
    });

    let cancel = CancellationToken::new();
    let signal_task = cancel_on_ctrl_c(cancel.clone());

    let result = run(config, tx, cancel.clone()).await;

    shutdown_gracefully(cancel, Some(signal_task)).await;
    let _ = printer.await;

    match result {
        Ok(summary) => {
            eprintln!(
                "Processed {} message{} ({} rows written, {} rows failed, {} rejected) in {:.1}s",
                summary.messages_received,
                if summary.messages_received == 1 { "" } else { "s" },
                summary.rows_written,
                summary.rows_failed,
                summary.messages_rejected,
                summary.elapsed_seconds
            );
            // A stdin reader may still be parked in a blocking read
            process::exit(0);
        }
        Err(e) => {
            eprintln!("sensor_bridge error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(
    config: Config,
    reports: mpsc::UnboundedSender<StatusReport>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    config.validate().context("Invalid configuration")?;

    let (source, _forwarder) = init_source(&config.source, config.queue_capacity)
        .await
        .context("Failed to open message source")?;
    let backend =
        init_storage_client(&config.storage_url).context("Failed to initialize storage client")?;

    match backend {
        StorageBackend::Sqlite(client) => {
            run_bridge(config, client, source, Some(reports), cancel).await
        }
        StorageBackend::Memory(client) => {
            run_bridge(config, client, source, Some(reports), cancel).await
        }
    }
}
