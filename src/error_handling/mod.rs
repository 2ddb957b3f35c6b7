//! Error handling and bridge statistics.
//!
//! This module provides:
//! - The error taxonomy (configuration, storage, write, source, initialization)
//! - Connection-class classification of storage failures
//! - The linear backoff retry schedule
//! - Atomic counters for what the bridge did

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{get_retry_strategy, has_connection_marker, LinearBackoff};
pub use stats::{BridgeStats, Counter};
pub use types::{
    ConfigError, InitializationError, RecordError, SourceError, StorageError, WriteError,
};
