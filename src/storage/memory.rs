//! In-memory storage client.
//!
//! Records every executed statement instead of talking to an engine. Used for
//! dry runs (`memory:` storage URL) and as a scriptable backend in tests:
//! connect, exec and close failures can be queued, statements matching a
//! pattern can be rejected permanently, and live sessions can be invalidated
//! to simulate a dropped connection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{ConnectSettings, ExecResult, StorageClient};
use super::insert::count_value_tuples;
use crate::error_handling::StorageError;

#[derive(Default)]
struct MemoryState {
    executed: Vec<String>,
    attempted: Vec<String>,
    connects: usize,
    connect_attempts: usize,
    closes: usize,
    generation: u64,
    connect_faults: VecDeque<StorageError>,
    exec_faults: VecDeque<StorageError>,
    close_faults: VecDeque<StorageError>,
    rejections: Vec<(String, String)>,
    selected_database: Option<String>,
}

/// Session handle of the in-memory client.
#[derive(Debug)]
pub struct MemorySession {
    generation: u64,
}

/// Storage client that keeps executed statements in memory.
#[derive(Clone, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
    connect_delay: Duration,
    exec_delay: Duration,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect takes `delay` before completing.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Every statement takes `delay` before completing.
    pub fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-update; the data is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next connect attempt fails with `error`.
    pub fn fail_connect(&self, error: StorageError) {
        self.lock().connect_faults.push_back(error);
    }

    /// The next statement (of any kind) fails with `error`. Queue several
    /// calls to fail several statements in a row.
    pub fn fail_next_exec(&self, error: StorageError) {
        self.lock().exec_faults.push_back(error);
    }

    /// The next close fails with `error`.
    pub fn fail_close(&self, error: StorageError) {
        self.lock().close_faults.push_back(error);
    }

    /// Every statement containing `pattern` is rejected with `message`.
    pub fn reject_containing(&self, pattern: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .rejections
            .push((pattern.into(), message.into()));
    }

    /// Invalidates every open session; their next statement fails with
    /// [`StorageError::Closed`].
    pub fn drop_sessions(&self) {
        self.lock().generation += 1;
    }

    /// Statements that succeeded, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Every statement handed to `exec`, including failed ones.
    pub fn attempted(&self) -> Vec<String> {
        self.lock().attempted.clone()
    }

    /// Successful connects.
    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Connect attempts, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    /// Sessions closed.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// Database passed to the most recent successful connect.
    pub fn selected_database(&self) -> Option<String> {
        self.lock().selected_database.clone()
    }
}

#[async_trait]
impl StorageClient for MemoryClient {
    type Connection = MemorySession;

    async fn connect(&self, settings: &ConnectSettings) -> Result<MemorySession, StorageError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let mut state = self.lock();
        state.connect_attempts += 1;
        if let Some(error) = state.connect_faults.pop_front() {
            return Err(error);
        }
        state.connects += 1;
        state.selected_database = settings.database.clone();
        Ok(MemorySession {
            generation: state.generation,
        })
    }

    async fn exec(&self, conn: &mut MemorySession, sql: &str) -> Result<ExecResult, StorageError> {
        if !self.exec_delay.is_zero() {
            tokio::time::sleep(self.exec_delay).await;
        }
        let mut state = self.lock();
        state.attempted.push(sql.to_string());
        if conn.generation != state.generation {
            return Err(StorageError::Closed);
        }
        if let Some(error) = state.exec_faults.pop_front() {
            return Err(error);
        }
        if let Some((_, message)) = state
            .rejections
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
        {
            return Err(StorageError::Statement(message.clone()));
        }
        state.executed.push(sql.to_string());
        Ok(ExecResult {
            rows_affected: count_value_tuples(sql) as u64,
            rows: Vec::new(),
        })
    }

    async fn close(&self, _conn: MemorySession) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.closes += 1;
        match state.close_faults.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
