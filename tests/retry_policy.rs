//! Connection retry and backoff through the full bridge.

mod helpers;

use std::time::Duration;

use sensor_bridge::source::ChannelSource;
use sensor_bridge::storage::MemoryClient;
use sensor_bridge::writer::{OutcomeStatus, WriteOutcome};
use sensor_bridge::{run_bridge, StorageError, WriteError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use helpers::{drain_reports, queued_source, reading, test_config};

#[tokio::test(start_paused = true)]
async fn one_connection_failure_costs_exactly_one_retry() {
    let client = MemoryClient::new();
    client.fail_next_exec(StorageError::Io {
        kind: std::io::ErrorKind::ConnectionReset,
        message: "connection reset by peer".to_string(),
    });
    let source = queued_source(&[("sensors/air", reading(1, 400, 30))]).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let start = tokio::time::Instant::now();
    let summary = run_bridge(test_config(), client.clone(), source, Some(tx), CancellationToken::new())
        .await
        .unwrap();

    let reports = drain_reports(&mut rx);
    assert_eq!(reports.len(), 1);
    match &reports[0].outcome {
        WriteOutcome::Success { retries, sql, .. } => {
            assert_eq!(*retries, 1);
            assert_eq!(sql, "INSERT INTO air (createtime, co2, pm25) VALUES (1, 400, 30)");
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(summary.retries, 1);
    assert_eq!(client.connects(), 2);
    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert!(start.elapsed() < Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn statement_errors_are_never_retried() {
    let client = MemoryClient::new();
    client.reject_containing("INSERT", "syntax error near VALUES");
    let mut config = test_config();
    config.retry_count = 10;
    let source = queued_source(&[("sensors/air", reading(1, 400, 30))]).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let summary = run_bridge(config, client.clone(), source, Some(tx), CancellationToken::new())
        .await
        .unwrap();

    let reports = drain_reports(&mut rx);
    assert_eq!(reports[0].status, OutcomeStatus::Failure);
    match &reports[0].outcome {
        WriteOutcome::Failure { error, retries, .. } => {
            assert!(matches!(error, WriteError::Rejected { .. }));
            assert_eq!(*retries, 0);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let inserts = client
        .attempted()
        .into_iter()
        .filter(|sql| sql.starts_with("INSERT"))
        .count();
    assert_eq!(inserts, 1);
    assert_eq!(summary.retries, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_reported_with_the_statement() {
    let client = MemoryClient::new();
    for _ in 0..4 {
        client.fail_connect(StorageError::ConnectTimeout(Duration::from_secs(30)));
    }
    let source = queued_source(&[("sensors/air", reading(1, 400, 30))]).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let summary = run_bridge(test_config(), client.clone(), source, Some(tx), CancellationToken::new())
        .await
        .unwrap();

    let reports = drain_reports(&mut rx);
    match &reports[0].outcome {
        WriteOutcome::Failure { error, sql, retries, .. } => {
            assert!(matches!(error, WriteError::RetriesExhausted { attempts: 4, .. }));
            assert_eq!(*retries, 3);
            assert!(sql.starts_with("INSERT INTO air"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(client.connect_attempts(), 4);
    assert_eq!(summary.rows_failed, 1);

    let json = serde_json::to_value(&reports[0]).unwrap();
    assert_eq!(json["topic"], "sensors/air");
    assert!(json["outcome"]["error"]
        .as_str()
        .unwrap()
        .starts_with("write failed after 4 attempts"));
}

#[tokio::test(start_paused = true)]
async fn bridge_recovers_after_dropped_session() {
    let client = MemoryClient::new();
    let (source, publisher) = ChannelSource::new(4);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = tokio::spawn(run_bridge(
        test_config(),
        client.clone(),
        source,
        Some(tx),
        CancellationToken::new(),
    ));

    publisher.publish("sensors/air", reading(1, 400, 30)).await.unwrap();
    let first = rx.recv().await.unwrap();
    assert_eq!(first.status, OutcomeStatus::Success);

    // The engine drops the cached session between messages
    client.drop_sessions();
    publisher.publish("sensors/air", reading(2, 410, 31)).await.unwrap();
    let second = rx.recv().await.unwrap();
    match &second.outcome {
        WriteOutcome::Success { retries, .. } => assert_eq!(*retries, 1),
        other => panic!("expected success, got {other:?}"),
    }

    drop(publisher);
    let summary = runner.await.unwrap().unwrap();
    assert_eq!(summary.rows_written, 2);
    assert_eq!(client.connects(), 2);
}
