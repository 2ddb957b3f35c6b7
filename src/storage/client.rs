//! Storage engine client interface.
//!
//! The bridge treats the storage engine as an opaque `exec(sql)` service.
//! [`StorageClient`] is the seam: it opens sessions, executes statements and
//! closes sessions. Session handles are owned by the
//! [`ConnectionManager`](super::ConnectionManager) and never leave it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error_handling::StorageError;

/// Everything needed to open one storage session.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    /// Endpoint URL
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Database selected at connect time, if any
    pub database: Option<String>,
    /// Bound on one connect attempt, enforced by the connection manager
    pub timeout: Duration,
}

/// Result of one executed statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecResult {
    /// Rows inserted/updated/deleted as reported by the engine
    pub rows_affected: u64,
    /// Rows returned by the statement, one JSON array per row
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Value>,
}

/// Client for a storage engine reachable through SQL statements.
#[async_trait]
pub trait StorageClient: Send + Sync + 'static {
    /// Live session handle.
    type Connection: Send;

    /// Opens and authenticates a new session.
    async fn connect(&self, settings: &ConnectSettings) -> Result<Self::Connection, StorageError>;

    /// Executes one statement on a session.
    async fn exec(&self, conn: &mut Self::Connection, sql: &str)
        -> Result<ExecResult, StorageError>;

    /// Gracefully closes a session.
    async fn close(&self, conn: Self::Connection) -> Result<(), StorageError>;

    /// Statement that selects `database` on a session, if the engine needs one.
    fn database_selection(&self, database: &str) -> Option<String> {
        Some(format!("USE {database}"))
    }
}
