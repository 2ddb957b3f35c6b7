//! Application initialization and resource setup.
//!
//! This module provides functions to initialize the shared resources of a
//! run:
//! - Logger
//! - Storage client, chosen by the storage URL scheme
//! - Message source: a file or stdin forwarded onto the bounded queue the
//!   bridge consumes
//!
//! All initialization functions return proper error types for error handling.

mod logger;

use log::info;
use tokio::task::JoinHandle;

use crate::error_handling::InitializationError;
use crate::source::{ChannelSource, LineSource};
use crate::storage::{MemoryClient, SqliteClient};

// Re-export public API
pub use logger::init_logger_with;

/// Storage client selected from the storage URL.
pub enum StorageBackend {
    /// `sqlite:` URLs
    Sqlite(SqliteClient),
    /// `memory:` URLs: statements are recorded, nothing is persisted
    Memory(MemoryClient),
}

/// Picks the storage client for `storage_url` by its scheme.
///
/// # Errors
///
/// Returns `InitializationError::UnsupportedStorageError` for any other scheme.
pub fn init_storage_client(storage_url: &str) -> Result<StorageBackend, InitializationError> {
    let scheme = storage_url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("sqlite") => Ok(StorageBackend::Sqlite(SqliteClient::new())),
        Some("memory") => {
            info!("Using in-memory storage: statements are logged, not persisted");
            Ok(StorageBackend::Memory(MemoryClient::new()))
        }
        _ => Err(InitializationError::UnsupportedStorageError(
            storage_url.to_string(),
        )),
    }
}

/// Opens the line-based message source (a file path, or `-` for stdin) and
/// forwards it onto a queue of `capacity` messages.
///
/// Returns the queue's consumer side and the forwarding task.
///
/// # Errors
///
/// Returns `InitializationError::SourceOpenError` if the file cannot be opened.
pub async fn init_source(
    source: &str,
    capacity: usize,
) -> Result<(ChannelSource, JoinHandle<()>), InitializationError> {
    let lines = LineSource::open(source)
        .await
        .map_err(|e| InitializationError::SourceOpenError(format!("{source}: {e}")))?;
    let (queue, publisher) = ChannelSource::new(capacity);
    let forwarder = publisher.forward_from(lines);
    Ok((queue, forwarder))
}
