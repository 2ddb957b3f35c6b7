//! Storage connection lifecycle.
//!
//! [`ConnectionManager`] owns the single live storage session. It connects
//! lazily, reconnects on demand, and closes on shutdown. The session handle is
//! only reachable through a [`LiveConnection`] guard, which holds the manager's
//! lock; a caller arriving while a connect attempt is in flight waits on that
//! lock and then sees the attempt's outcome, so two connect attempts never
//! run at once.

use std::fmt;

use log::{debug, info, warn};
use tokio::sync::{Mutex, MutexGuard};

use super::client::{ConnectSettings, ExecResult, StorageClient};
use crate::error_handling::StorageError;

/// Lifecycle state of the storage connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; the next use connects.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A session is open and cached.
    Ready,
    /// The last connect attempt failed; the next use retries.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct Slot<T> {
    state: ConnectionState,
    handle: Option<T>,
}

/// Owner of the single storage session. There is no pooling: the bridge is a
/// single writer.
pub struct ConnectionManager<C: StorageClient> {
    client: C,
    settings: ConnectSettings,
    slot: Mutex<Slot<C::Connection>>,
}

impl<C: StorageClient> ConnectionManager<C> {
    pub fn new(client: C, settings: ConnectSettings) -> Self {
        ConnectionManager {
            client,
            settings,
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                handle: None,
            }),
        }
    }

    /// The client this manager opens sessions with.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Current lifecycle state. Waits for any in-flight operation first.
    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state
    }

    /// Returns the live session, connecting first unless the state is `Ready`.
    ///
    /// On failure the state becomes `Failed` and the error is returned to the
    /// caller, which owns the retry decision.
    pub async fn ensure_connection(&self) -> Result<LiveConnection<'_, C>, StorageError> {
        let mut slot = self.slot.lock().await;
        if slot.state != ConnectionState::Ready || slot.handle.is_none() {
            self.connect_locked(&mut slot).await?;
        }
        Ok(LiveConnection {
            client: &self.client,
            slot,
        })
    }

    /// Drops the current session (if any) and connects again.
    pub async fn reconnect(&self) -> Result<(), StorageError> {
        let mut slot = self.slot.lock().await;
        self.close_locked(&mut slot).await;
        self.connect_locked(&mut slot).await
    }

    /// Closes the live session. Errors are logged, never propagated, so
    /// teardown cannot be blocked by a failing close.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        if slot.handle.is_some() {
            self.close_locked(&mut slot).await;
            info!("Storage connection closed");
        }
        slot.state = ConnectionState::Disconnected;
    }

    async fn connect_locked(&self, slot: &mut Slot<C::Connection>) -> Result<(), StorageError> {
        if let Some(stale) = slot.handle.take() {
            debug!("Closing stale storage session before reconnecting");
            if let Err(e) = self.client.close(stale).await {
                debug!("Ignoring error while closing stale session: {e}");
            }
        }

        slot.state = ConnectionState::Connecting;
        debug!("Connecting to storage at {}", self.settings.endpoint);

        let attempt =
            tokio::time::timeout(self.settings.timeout, self.client.connect(&self.settings)).await;
        match attempt {
            Ok(Ok(handle)) => {
                slot.handle = Some(handle);
                slot.state = ConnectionState::Ready;
                info!(
                    "Connected to storage at {} (database: {})",
                    self.settings.endpoint,
                    self.settings.database.as_deref().unwrap_or("<none>")
                );
                Ok(())
            }
            Ok(Err(e)) => {
                slot.state = ConnectionState::Failed;
                warn!("Storage connect failed: {e}");
                Err(e)
            }
            Err(_) => {
                slot.state = ConnectionState::Failed;
                warn!(
                    "Storage connect timed out after {:?}",
                    self.settings.timeout
                );
                Err(StorageError::ConnectTimeout(self.settings.timeout))
            }
        }
    }

    async fn close_locked(&self, slot: &mut Slot<C::Connection>) {
        if let Some(handle) = slot.handle.take() {
            if let Err(e) = self.client.close(handle).await {
                warn!("Error while closing storage connection: {e}");
            }
        }
        slot.state = ConnectionState::Disconnected;
    }
}

/// Exclusive access to the live session.
///
/// Holding this guard blocks every other user of the manager, which keeps
/// statement execution single-writer.
pub struct LiveConnection<'a, C: StorageClient> {
    client: &'a C,
    slot: MutexGuard<'a, Slot<C::Connection>>,
}

impl<C: StorageClient> LiveConnection<'_, C> {
    /// Executes one statement on the session.
    pub async fn exec(&mut self, sql: &str) -> Result<ExecResult, StorageError> {
        let handle = self.slot.handle.as_mut().ok_or(StorageError::Closed)?;
        self.client.exec(handle, sql).await
    }

    /// Issues the engine's database-selection statement, if it has one.
    pub async fn select_database(&mut self, database: &str) -> Result<(), StorageError> {
        if let Some(statement) = self.client.database_selection(database) {
            self.exec(&statement).await?;
        }
        Ok(())
    }

    /// Discards the session after a fatal error. Close errors are swallowed.
    pub async fn discard(mut self) {
        if let Some(handle) = self.slot.handle.take() {
            if let Err(e) = self.client.close(handle).await {
                debug!("Ignoring error while discarding storage session: {e}");
            }
        }
        self.slot.state = ConnectionState::Disconnected;
    }
}
