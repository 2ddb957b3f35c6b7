//! Graceful shutdown: buffered records are written before the connection closes.

mod helpers;

use std::time::Duration;

use sensor_bridge::batch::FlushReason;
use sensor_bridge::source::ChannelSource;
use sensor_bridge::storage::MemoryClient;
use sensor_bridge::writer::OutcomeStatus;
use sensor_bridge::{run_bridge, shutdown_gracefully};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use helpers::{batched_config, drain_reports, publish_all, reading};

#[tokio::test(start_paused = true)]
async fn cancel_flushes_buffer_then_closes() {
    // Slow statements make any close-before-write ordering visible
    let client = MemoryClient::new().with_exec_delay(Duration::from_millis(200));
    let (source, publisher) = ChannelSource::new(16);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let runner = tokio::spawn(run_bridge(
        batched_config(10),
        client.clone(),
        source,
        Some(tx),
        cancel.clone(),
    ));

    let messages: Vec<_> = (0..4)
        .map(|i| ("sensors/air", reading(i, 400, 30)))
        .collect();
    publish_all(&publisher, &messages).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.executed().is_empty());

    shutdown_gracefully(cancel, None).await;
    let summary = runner.await.unwrap().unwrap();

    let reports = drain_reports(&mut rx);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].flush, Some(FlushReason::Shutdown));
    assert_eq!(reports[0].status, OutcomeStatus::Success);
    assert_eq!(summary.rows_written, 4);

    assert_eq!(client.executed().len(), 2);
    assert_eq!(client.closes(), 1);
    // The source subscription was released too
    assert!(publisher.is_closed());
}

#[tokio::test(start_paused = true)]
async fn cancel_processes_messages_already_queued() {
    let client = MemoryClient::new();
    let (source, publisher) = ChannelSource::new(16);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let messages: Vec<_> = (0..5)
        .map(|i| ("sensors/air", reading(i, 400, 30)))
        .collect();
    publish_all(&publisher, &messages).await;

    // Cancelled before the bridge ever polls the queue; the publisher stays alive
    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = run_bridge(batched_config(10), client.clone(), source, Some(tx), cancel)
        .await
        .unwrap();

    assert_eq!(summary.messages_received, 5);
    assert_eq!(summary.rows_written, 5);
    let reports = drain_reports(&mut rx);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].flush, Some(FlushReason::Shutdown));
    assert_eq!(
        client.executed().last().map(String::as_str),
        Some(
            "INSERT INTO air (createtime, co2, pm25) VALUES \
             (0, 400, 30), (1, 400, 30), (2, 400, 30), (3, 400, 30), (4, 400, 30)"
        )
    );
    assert!(publisher.is_closed());
    assert!(publisher.try_publish("sensors/air", reading(9, 400, 30)).is_err());
}

#[tokio::test(start_paused = true)]
async fn end_of_stream_drains_like_cancel() {
    let client = MemoryClient::new();
    let (source, publisher) = ChannelSource::new(16);
    let messages: Vec<_> = (0..3)
        .map(|i| ("sensors/air", reading(i, 400, 30)))
        .collect();
    publish_all(&publisher, &messages).await;
    drop(publisher);

    let summary = run_bridge(batched_config(10), client.clone(), source, None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 3);
    assert_eq!(
        client.executed().last().map(String::as_str),
        Some("INSERT INTO air (createtime, co2, pm25) VALUES (0, 400, 30), (1, 400, 30), (2, 400, 30)")
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_with_empty_buffer_never_connects() {
    let client = MemoryClient::new();
    let (source, _publisher) = ChannelSource::new(4);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_bridge(batched_config(10), client.clone(), source, None, cancel)
        .await
        .unwrap();

    assert_eq!(summary.messages_received, 0);
    assert_eq!(client.connect_attempts(), 0);
    assert_eq!(client.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn close_failure_does_not_block_shutdown() {
    let client = MemoryClient::new();
    client.fail_close(sensor_bridge::StorageError::Connection("socket already gone".into()));
    let (source, publisher) = ChannelSource::new(4);
    publish_all(&publisher, &[("sensors/air", reading(1, 400, 30))]).await;
    drop(publisher);

    let summary = run_bridge(batched_config(10), client.clone(), source, None, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.rows_written, 1);
    assert_eq!(client.closes(), 1);
}
