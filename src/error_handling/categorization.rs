//! Error categorization and retry strategy.
//!
//! This module decides which storage failures are connection-class (eligible
//! for retry) and provides the linear backoff schedule used between retries.

use std::io::ErrorKind;
use std::time::Duration;

use super::types::StorageError;

/// Message fragments that mark a failure as transport/session related.
const CONNECTION_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "closed",
    "reset",
    "broken pipe",
    "econnreset",
];

/// I/O error kinds in the reset family.
fn is_reset_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
    )
}

/// Returns true when `message` carries one of the connection markers.
///
/// Matching is case-insensitive.
pub fn has_connection_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECTION_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl StorageError {
    /// Whether this failure arose from transport/session state rather than
    /// statement content.
    ///
    /// Connection-class failures are retried with backoff; everything else
    /// surfaces immediately.
    pub fn is_connection_class(&self) -> bool {
        match self {
            StorageError::Connection(_) | StorageError::ConnectTimeout(_) | StorageError::Closed => {
                true
            }
            StorageError::Io { kind, message } => {
                is_reset_kind(*kind) || has_connection_marker(message)
            }
            StorageError::Statement(message) => has_connection_marker(message),
        }
    }
}

/// Linear backoff: the `n`-th retry waits `n * base`.
///
/// Unbounded on its own; cap it with [`Iterator::take`] using the retry count.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sensor_bridge::LinearBackoff;
///
/// let delays: Vec<_> = LinearBackoff::new(Duration::from_millis(1000)).take(3).collect();
/// assert_eq!(
///     delays,
///     vec![
///         Duration::from_millis(1000),
///         Duration::from_millis(2000),
///         Duration::from_millis(3000),
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        LinearBackoff { base, attempt: 0 }
    }
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        Some(self.base.saturating_mul(self.attempt))
    }
}

/// Creates the retry schedule for a write: `retry_count` delays of
/// `base * attempt`.
///
/// The iterator is consumed by `tokio_retry::RetryIf`, which makes one
/// attempt more than the number of delays it yields.
pub fn get_retry_strategy(base: Duration, retry_count: u32) -> impl Iterator<Item = Duration> {
    LinearBackoff::new(base).take(retry_count as usize)
}
