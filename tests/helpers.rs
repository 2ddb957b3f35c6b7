// Shared test helpers for bridge setup and SQLite fixtures.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::Path;
use std::time::Duration;

use sensor_bridge::source::{ChannelPublisher, ChannelSource};
use sensor_bridge::{Config, StatusReport};
use sqlx::SqlitePool;
use tokio::sync::mpsc;

/// Configuration accepted by `Config::validate`, in immediate mode.
#[allow(dead_code)] // Used by other test files
pub fn test_config() -> Config {
    Config {
        topic: "sensors/#".to_string(),
        storage_url: "memory:".to_string(),
        database: "power".to_string(),
        table: "air".to_string(),
        sql_template: "INSERT INTO ${table} (createtime, co2, pm25) VALUES (${timestamp}, ${co2}, ${pm25})"
            .to_string(),
        retry_base_delay: Duration::from_millis(1000),
        ..Default::default()
    }
}

/// Batched-mode configuration flushing every `batch_size` records.
#[allow(dead_code)] // Used by other test files
pub fn batched_config(batch_size: usize) -> Config {
    Config {
        batch: true,
        batch_size,
        batch_timeout: Duration::from_millis(1000),
        ..test_config()
    }
}

/// Payload of one air-quality reading.
#[allow(dead_code)] // Used by other test files
pub fn reading(timestamp: i64, co2: i64, pm25: i64) -> String {
    format!(r#"{{"timestamp": {timestamp}, "co2": {co2}, "pm25": {pm25}}}"#)
}

/// Queues `messages` and closes the publisher, so the bridge stops once they
/// are processed.
#[allow(dead_code)] // Used by other test files
pub async fn queued_source(messages: &[(&str, String)]) -> ChannelSource {
    let (source, publisher) = ChannelSource::new(messages.len().max(1));
    publish_all(&publisher, messages).await;
    source
}

#[allow(dead_code)] // Used by other test files
pub async fn publish_all(publisher: &ChannelPublisher, messages: &[(&str, String)]) {
    for (topic, payload) in messages {
        publisher
            .publish(*topic, payload.clone())
            .await
            .expect("Failed to queue message");
    }
}

/// Drains every report currently queued.
#[allow(dead_code)] // Used by other test files
pub fn drain_reports(rx: &mut mpsc::UnboundedReceiver<StatusReport>) -> Vec<StatusReport> {
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    reports
}

/// `sqlite:` URL for a database file.
#[allow(dead_code)] // Used by other test files
pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite:{}", path.to_string_lossy())
}

/// Creates the database file with an `air` table rejecting implausible CO2
/// readings.
#[allow(dead_code)] // Used by other test files
pub async fn create_air_table(path: &Path) -> SqlitePool {
    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to create test database");
    sqlx::query(
        "CREATE TABLE air (createtime INTEGER NOT NULL, co2 INTEGER CHECK (co2 < 1000), pm25 INTEGER)",
    )
    .execute(&pool)
    .await
    .expect("Failed to create air table");
    pool
}

/// Rows of the `air` table ordered by timestamp.
#[allow(dead_code)] // Used by other test files
pub async fn air_rows(pool: &SqlitePool) -> Vec<(i64, Option<i64>, Option<i64>)> {
    sqlx::query_as("SELECT createtime, co2, pm25 FROM air ORDER BY createtime")
        .fetch_all(pool)
        .await
        .expect("Failed to query air table")
}
