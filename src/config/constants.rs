//! Configuration constants.
//!
//! This module defines the defaults used throughout the bridge: batching
//! thresholds, retry policy, connection timeouts and the fallback values used
//! when building batched records.

use std::time::Duration;

// Batching
/// Number of buffered records that triggers an immediate flush
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Idle window after the first unflushed record before a timed flush fires
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

// Retry strategy
/// Retries after the initial attempt (4 attempts total)
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Base delay for linear backoff: retry `n` waits `n * base`
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

// Storage connection
/// Upper bound on a single connect attempt (transport + auth + database selection)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORAGE_USERNAME: &str = "root";
pub const DEFAULT_STORAGE_PASSWORD: &str = "taosdata";

// Message source
/// Capacity of the bounded queue between the message source and the worker loop
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Reads messages from stdin when used as the source address
pub const STDIN_SOURCE: &str = "-";

// Batched record construction
/// Column list used by batched mode when none is configured.
/// The first column always receives the record timestamp.
pub const DEFAULT_BATCH_COLUMNS: &[&str] = &["createtime", "co2", "pm25"];
/// Payload field consulted for the record timestamp
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Field name a non-JSON payload is wrapped under
pub const RAW_VALUE_FIELD: &str = "value";

/// Ranges used when fabricating a missing telemetry field (`min..max`).
/// Fields not listed here use [`FABRICATED_DEFAULT_RANGE`].
pub const FABRICATED_FIELD_RANGES: &[(&str, i64, i64)] = &[("co2", 300, 500), ("pm25", 10, 100)];
pub const FABRICATED_DEFAULT_RANGE: (i64, i64) = (0, 100);

// Reporting
/// Maximum statement length carried in a status report before truncation
pub const MAX_REPORTED_SQL_LENGTH: usize = 4000;
