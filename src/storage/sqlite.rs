//! SQLite storage client on `sqlx`.
//!
//! The endpoint is a `sqlx` SQLite URL (`sqlite:./telemetry.db`,
//! `sqlite::memory:`). The database file is created if missing and opened in
//! WAL mode. SQLite has one database per connection, so there is no
//! database-selection statement; credentials are ignored.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, SqliteConnection};

use super::client::{ConnectSettings, ExecResult, StorageClient};
use crate::error_handling::StorageError;

/// Statement prefixes whose results are rows rather than an affected count.
const ROW_RETURNING_PREFIXES: &[&str] = &["SELECT", "PRAGMA", "WITH", "EXPLAIN"];

/// Storage client backed by a SQLite database file.
#[derive(Debug, Clone, Default)]
pub struct SqliteClient;

impl SqliteClient {
    pub fn new() -> Self {
        SqliteClient
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    ROW_RETURNING_PREFIXES
        .iter()
        .any(|prefix| head.starts_with(prefix))
}

/// Converts a row into a JSON array, column by column.
fn row_to_json(row: &SqliteRow) -> Value {
    let values = (0..row.len())
        .map(|i| {
            if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            if let Ok(v) = row.try_get::<Option<String>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            Value::Null
        })
        .collect();
    Value::Array(values)
}

#[async_trait]
impl StorageClient for SqliteClient {
    type Connection = SqliteConnection;

    async fn connect(&self, settings: &ConnectSettings) -> Result<SqliteConnection, StorageError> {
        let options = SqliteConnectOptions::from_str(&settings.endpoint)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let conn = options.connect().await?;
        Ok(conn)
    }

    async fn exec(&self, conn: &mut SqliteConnection, sql: &str) -> Result<ExecResult, StorageError> {
        if returns_rows(sql) {
            let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
            Ok(ExecResult {
                rows_affected: 0,
                rows: rows.iter().map(row_to_json).collect(),
            })
        } else {
            let result = sqlx::query(sql).execute(&mut *conn).await?;
            Ok(ExecResult {
                rows_affected: result.rows_affected(),
                rows: Vec::new(),
            })
        }
    }

    async fn close(&self, conn: SqliteConnection) -> Result<(), StorageError> {
        conn.close().await?;
        Ok(())
    }

    fn database_selection(&self, _database: &str) -> Option<String> {
        None
    }
}
