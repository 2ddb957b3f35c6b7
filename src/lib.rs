//! sensor_bridge library: pub/sub telemetry to time-series SQL ingest
//!
//! This library subscribes to a message stream, turns each message into SQL
//! insert statements (rendered from a template, or buffered and written as
//! multi-row inserts), and writes them through a single storage connection
//! with connection retry and per-row fallback.
//!
//! # Example
//!
//! ```no_run
//! use sensor_bridge::source::ChannelSource;
//! use sensor_bridge::storage::SqliteClient;
//! use sensor_bridge::{run_bridge, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     topic: "sensors/#".to_string(),
//!     storage_url: "sqlite:./telemetry.db".to_string(),
//!     database: "power".to_string(),
//!     table: "air_sensor_001".to_string(),
//!     sql_template: "INSERT INTO ${table} VALUES (${timestamp}, ${co2}, ${pm25})".to_string(),
//!     batch: true,
//!     ..Default::default()
//! };
//!
//! let (source, publisher) = ChannelSource::new(config.queue_capacity);
//! publisher.publish("sensors/air", r#"{"co2": 412, "pm25": 31}"#).await?;
//! drop(publisher);
//!
//! let summary = run_bridge(config, SqliteClient::new(), source, None, CancellationToken::new()).await?;
//! println!("{} rows written", summary.rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

mod app;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod source;
pub mod storage;
pub mod template;
pub mod writer;

// Re-export public API
pub use app::{cancel_on_ctrl_c, shutdown_gracefully};
pub use bridge::{Bridge, Reporter, StatusReport};
pub use config::{Config, LogFormat, LogLevel, Opt};
pub use error_handling::{BridgeStats, ConfigError, Counter, LinearBackoff, StorageError, WriteError};
pub use run::{run_bridge, RunSummary};

// Internal run module (wires configuration, storage and source into a bridge)
mod run {
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::info;
    use serde::Serialize;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio_util::sync::CancellationToken;

    use crate::app::{log_throughput, print_bridge_statistics};
    use crate::bridge::{Bridge, Reporter, StatusReport};
    use crate::config::Config;
    use crate::error_handling::Counter;
    use crate::source::MessageSource;
    use crate::storage::StorageClient;

    /// Results of a bridge run.
    #[derive(Debug, Clone, Serialize)]
    pub struct RunSummary {
        /// Messages taken from the source
        pub messages_received: usize,
        /// Messages dropped before reaching storage
        pub messages_rejected: usize,
        /// Rows persisted
        pub rows_written: usize,
        /// Rows that could not be persisted
        pub rows_failed: usize,
        /// Retries spent on connection-class failures
        pub retries: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs the bridge until `cancel` fires or the source ends.
    ///
    /// The configuration is validated first; an invalid configuration stops
    /// the run before anything is connected. Status reports are sent on
    /// `reports` when given, and always logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the subscription is
    /// refused. Write failures are reported, never returned.
    pub async fn run_bridge<C, S>(
        config: Config,
        client: C,
        source: S,
        reports: Option<UnboundedSender<StatusReport>>,
        cancel: CancellationToken,
    ) -> Result<RunSummary>
    where
        C: StorageClient,
        S: MessageSource,
    {
        config.validate().context("Refusing to start")?;

        let start = Instant::now();
        let reporter = reports.map(Reporter::new).unwrap_or_else(Reporter::log_only);
        info!(
            "Bridging topic {} to {} (database: {}, table: {})",
            config.topic, config.storage_url, config.database, config.table
        );

        let bridge = Bridge::new(&config, client, source, reporter);
        let stats = bridge
            .run(cancel)
            .await
            .with_context(|| format!("Failed to subscribe to {}", config.topic))?;

        let elapsed = start.elapsed();
        print_bridge_statistics(&stats);
        log_throughput(elapsed, &stats);

        Ok(RunSummary {
            messages_received: stats.get(Counter::MessagesReceived),
            messages_rejected: stats.get(Counter::MessagesRejected),
            rows_written: stats.get(Counter::RowsWritten),
            rows_failed: stats.get(Counter::RowsFailed),
            retries: stats.get(Counter::Retries),
            elapsed_seconds: elapsed.as_secs_f64(),
        })
    }
}
