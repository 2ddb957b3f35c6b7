//! Command-line options.

use std::time::Duration;

use clap::Parser;

use crate::config::constants::*;
use crate::config::types::{Config, LogFormat, LogLevel};
use crate::source::Qos;

/// Command-line options and configuration.
///
/// Credentials may also come from the environment (or a `.env` file) so they
/// never have to appear on the command line.
///
/// # Examples
///
/// ```bash
/// # Immediate mode, messages read from stdin as `topic payload` lines
/// sensor_bridge --topic 'sensors/#' --storage-url sqlite:./telemetry.db \
///     --database power --table air_sensor_001 \
///     --sql-template 'INSERT INTO ${table} VALUES (${timestamp}, ${co2}, ${pm25})'
///
/// # Batched mode replaying a capture file
/// sensor_bridge capture.txt --batch --batch-size 50 --batch-timeout-ms 500 ...
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "sensor_bridge",
    about = "Writes pub/sub sensor telemetry into a time-series SQL store."
)]
pub struct Opt {
    /// Message source: file of `topic payload` lines, or `-` for stdin
    #[arg(default_value = STDIN_SOURCE)]
    pub source: String,

    /// Topic filter to subscribe to (`+` and `#` wildcards allowed)
    #[arg(long)]
    pub topic: String,

    /// Subscription QoS level (0, 1 or 2)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,

    /// Storage endpoint URL (`sqlite:<path>` or `memory:`)
    #[arg(long, env = "SENSOR_BRIDGE_STORAGE_URL")]
    pub storage_url: String,

    /// Storage user name
    #[arg(long, env = "SENSOR_BRIDGE_USERNAME", default_value = DEFAULT_STORAGE_USERNAME)]
    pub username: String,

    /// Storage password
    #[arg(
        long,
        env = "SENSOR_BRIDGE_PASSWORD",
        default_value = DEFAULT_STORAGE_PASSWORD,
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Database selected before each statement
    #[arg(long)]
    pub database: String,

    /// Target table; may reference payload fields, e.g. `sensor_${device}`
    #[arg(long)]
    pub table: String,

    /// SQL template used in immediate mode
    #[arg(long)]
    pub sql_template: String,

    /// Buffer records and write them as multi-row inserts
    #[arg(long)]
    pub batch: bool,

    /// Record count that triggers a flush
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Idle window (milliseconds) before buffered records are flushed
    #[arg(long, default_value_t = DEFAULT_BATCH_TIMEOUT_MS)]
    pub batch_timeout_ms: u64,

    /// Comma-separated batched-mode columns; the first receives the timestamp
    #[arg(long, value_delimiter = ',', default_value = "createtime,co2,pm25")]
    pub batch_columns: Vec<String>,

    /// Invent plausible values for missing telemetry fields instead of writing NULL
    #[arg(long)]
    pub fabricate_missing_fields: bool,

    /// Retries after the first attempt on connection-class failures
    #[arg(long, default_value_t = DEFAULT_RETRY_COUNT)]
    pub retry_count: u32,

    /// Linear backoff base delay in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Capacity of the inbound message queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl From<Opt> for Config {
    fn from(opt: Opt) -> Self {
        Config {
            source: opt.source,
            topic: opt.topic,
            qos: Qos::try_from(opt.qos).unwrap_or_default(),
            storage_url: opt.storage_url,
            username: opt.username,
            password: opt.password,
            database: opt.database,
            table: opt.table,
            sql_template: opt.sql_template,
            batch: opt.batch,
            batch_size: opt.batch_size,
            batch_timeout: Duration::from_millis(opt.batch_timeout_ms),
            batch_columns: opt
                .batch_columns
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect(),
            fabricate_missing_fields: opt.fabricate_missing_fields,
            retry_count: opt.retry_count,
            retry_base_delay: Duration::from_millis(opt.retry_base_delay_ms),
            connect_timeout: Duration::from_secs(opt.connect_timeout_secs),
            queue_capacity: opt.queue_capacity,
            log_level: opt.log_level,
            log_format: opt.log_format,
        }
    }
}
