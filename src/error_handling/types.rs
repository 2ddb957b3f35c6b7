//! Error type definitions.
//!
//! This module defines the error taxonomy of the bridge: configuration,
//! storage, write and message-source failures, plus initialization errors.

use std::io;
use std::time::Duration;

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Storage endpoint URL names a backend this build does not provide.
    #[error("Unsupported storage URL: {0}")]
    UnsupportedStorageError(String),

    /// Message source could not be opened.
    #[error("Message source error: {0}")]
    SourceOpenError(String),
}

/// Invalid or incomplete bridge configuration.
///
/// Fatal: the bridge refuses to start rather than run in a degraded state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more configuration problems, all reported together.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Failures talking to the storage engine.
///
/// [`StorageError::is_connection_class`] decides whether a failure arose from
/// transport/session state (retried) or from statement content (surfaced).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Transport or authentication failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Connect attempt exceeded its bound.
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// The session is gone (closed by peer, or discarded).
    #[error("connection closed")]
    Closed,

    /// Low-level I/O failure.
    #[error("I/O error ({kind:?}): {message}")]
    Io {
        /// Kind of the underlying I/O error
        kind: io::ErrorKind,
        /// Rendered message of the underlying I/O error
        message: String,
    },

    /// The storage engine rejected the statement.
    #[error("statement rejected: {0}")]
    Statement(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(io_err) => io_err.into(),
            sqlx::Error::PoolTimedOut => StorageError::Connection("pool timed out".to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => StorageError::Closed,
            sqlx::Error::Tls(tls_err) => StorageError::Connection(tls_err.to_string()),
            sqlx::Error::Configuration(cfg_err) => {
                StorageError::Connection(format!("configuration: {cfg_err}"))
            }
            sqlx::Error::Database(db_err) => StorageError::Statement(db_err.message().to_string()),
            other => StorageError::Statement(other.to_string()),
        }
    }
}

/// Failure of a write after the retry policy has been applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Non-connection-class failure, surfaced without further retries.
    #[error("{source}")]
    Rejected {
        /// Underlying storage failure
        source: StorageError,
        /// Retries spent before the failure (on earlier connection errors)
        retries: u32,
    },

    /// Connection-class failures on every attempt.
    #[error("write failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Failure of the last attempt
        source: StorageError,
    },
}

impl WriteError {
    /// Retries spent before the operation gave up.
    pub fn retries(&self) -> u32 {
        match self {
            WriteError::Rejected { retries, .. } => *retries,
            WriteError::RetriesExhausted { attempts, .. } => attempts.saturating_sub(1),
        }
    }

    /// The storage failure of the last attempt.
    pub fn storage_error(&self) -> &StorageError {
        match self {
            WriteError::Rejected { source, .. } | WriteError::RetriesExhausted { source, .. } => {
                source
            }
        }
    }
}

/// A message that cannot be turned into a buffered record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The rendered table name still contains `${...}` placeholders.
    #[error("table name '{0}' has unresolved placeholders")]
    UnresolvedTable(String),

    /// The rendered table name is empty.
    #[error("table name renders to an empty string")]
    EmptyTable,

    /// The rendered table name is not a plain SQL identifier.
    #[error("table name '{0}' is not a valid identifier")]
    InvalidTable(String),
}

/// Errors observed on the message source.
///
/// The source owns its own reconnect logic; the bridge only logs these.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading from the underlying transport failed.
    #[error("source transport error: {0}")]
    Transport(#[from] io::Error),

    /// Subscription was refused.
    #[error("subscription to '{topic}' failed: {reason}")]
    Subscribe {
        /// Topic filter that was refused
        topic: String,
        /// Reason reported by the transport
        reason: String,
    },

    /// The publishing side of the queue has been closed.
    #[error("message source disconnected")]
    Disconnected,
}
