//! Configuration types.
//!
//! This module defines the library configuration struct and the logging
//! enums shared with the command-line parser.

use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::*;
use crate::source::Qos;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// Every field has a default except the ones that identify where data comes
/// from and where it goes; those must be filled in before
/// [`Config::validate`] accepts the configuration.
///
/// # Examples
///
/// ```no_run
/// use sensor_bridge::Config;
///
/// let config = Config {
///     topic: "sensors/+/air".to_string(),
///     storage_url: "sqlite:./telemetry.db".to_string(),
///     database: "power".to_string(),
///     table: "air_sensor_001".to_string(),
///     sql_template: "INSERT INTO ${table} VALUES (NOW, ${co2}, ${pm25})".to_string(),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Message source address: input file path, or `-` for stdin
    pub source: String,

    /// Subscription topic filter (`+` and `#` wildcards allowed)
    pub topic: String,

    /// Subscription quality of service
    pub qos: Qos,

    /// Storage endpoint URL
    pub storage_url: String,

    /// Storage user name
    pub username: String,

    /// Storage password
    pub password: String,

    /// Database selected before every statement
    pub database: String,

    /// Target table (may reference payload fields, e.g. `sensor_${device}`)
    pub table: String,

    /// SQL template rendered for every message in immediate mode
    pub sql_template: String,

    /// Buffer records and write them as multi-row inserts
    pub batch: bool,

    /// Record count that triggers a flush
    pub batch_size: usize,

    /// Idle window before buffered records are flushed anyway
    pub batch_timeout: Duration,

    /// Columns written in batched mode; the first receives the timestamp
    pub batch_columns: Vec<String>,

    /// Invent plausible values for missing telemetry fields instead of NULL
    pub fabricate_missing_fields: bool,

    /// Retries after the first attempt on connection-class failures
    pub retry_count: u32,

    /// Linear backoff base delay
    pub retry_base_delay: Duration,

    /// Bound on a single connect attempt
    pub connect_timeout: Duration,

    /// Capacity of the queue between the source and the worker loop
    pub queue_capacity: usize,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Optional view of the configured database (empty means none).
    pub fn database_name(&self) -> Option<&str> {
        let trimmed = self.database.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: STDIN_SOURCE.to_string(),
            topic: String::new(),
            qos: Qos::AtMostOnce,
            storage_url: String::new(),
            username: DEFAULT_STORAGE_USERNAME.to_string(),
            password: DEFAULT_STORAGE_PASSWORD.to_string(),
            database: String::new(),
            table: String::new(),
            sql_template: String::new(),
            batch: false,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: Duration::from_millis(DEFAULT_BATCH_TIMEOUT_MS),
            batch_columns: DEFAULT_BATCH_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            fabricate_missing_fields: false,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}
