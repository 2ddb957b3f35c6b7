//! Bridge orchestrator.
//!
//! One worker loop owns the message source, the batch aggregator and the
//! write executor. It processes one message to completion before pulling the
//! next, so per-topic order from the source is kept all the way to storage.
//! The loop waits on three things, in priority order: the shutdown signal,
//! the idle-flush deadline, and the next message.
//!
//! On shutdown the source stops taking input, messages it already accepted
//! are processed, and the buffer is drained and its writes awaited before
//! the storage connection is closed.

mod record;
mod report;

use std::future::pending;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::batch::{Batch, BatchAggregator, BatchConfig, FlushReason};
use crate::config::Config;
use crate::error_handling::{BridgeStats, Counter, SourceError};
use crate::source::{InboundMessage, MessageSource, Qos};
use crate::storage::{ConnectSettings, ConnectionManager, StorageClient};
use crate::template::render;
use crate::writer::{RetryPolicy, WriteExecutor};

pub use record::{fabricated_value, payload_fields, RecordBuilder};
pub use report::{Reporter, StatusReport};

/// Sleeps until `deadline`, or forever when there is none.
async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Writes one flushed batch and reports every outcome.
async fn write_batch<C: StorageClient>(
    executor: &WriteExecutor<C>,
    reporter: &Reporter,
    stats: &BridgeStats,
    batch: Batch,
) {
    let reason = batch.reason;
    stats.increment(match reason {
        FlushReason::Count => Counter::FlushesByCount,
        FlushReason::Timeout => Counter::FlushesByTimeout,
        FlushReason::Shutdown => Counter::FlushesOnShutdown,
    });
    for outcome in executor.write_batch(batch).await {
        reporter.report(StatusReport::for_flush(reason, outcome));
    }
}

/// Connection settings derived from the bridge configuration.
pub fn connect_settings(config: &Config) -> ConnectSettings {
    ConnectSettings {
        endpoint: config.storage_url.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
        database: config.database_name().map(str::to_string),
        timeout: config.connect_timeout,
    }
}

/// How messages are written.
enum Mode {
    /// Buffer records and flush them as multi-row inserts.
    Batched {
        aggregator: BatchAggregator,
        records: RecordBuilder,
    },
    /// Render the SQL template and write each message on its own.
    Immediate,
}

/// Wires a message source to the storage engine.
pub struct Bridge<C: StorageClient, S: MessageSource> {
    source: S,
    topic: String,
    qos: Qos,
    table: String,
    database: String,
    sql_template: String,
    mode: Mode,
    executor: WriteExecutor<C>,
    reporter: Reporter,
    stats: Arc<BridgeStats>,
}

impl<C: StorageClient, S: MessageSource> Bridge<C, S> {
    /// Builds a bridge. `config` is expected to be validated already.
    pub fn new(config: &Config, client: C, source: S, reporter: Reporter) -> Self {
        let stats = Arc::new(BridgeStats::new());
        let connections = Arc::new(ConnectionManager::new(client, connect_settings(config)));
        let executor = WriteExecutor::new(
            connections,
            config.database_name().map(str::to_string),
            RetryPolicy {
                retry_count: config.retry_count,
                base_delay: config.retry_base_delay,
            },
            Arc::clone(&stats),
        );

        let mode = if config.batch {
            Mode::Batched {
                aggregator: BatchAggregator::new(BatchConfig {
                    batch_size: config.batch_size,
                    batch_timeout: config.batch_timeout,
                }),
                records: RecordBuilder::from_config(config),
            }
        } else {
            Mode::Immediate
        };

        Bridge {
            source,
            topic: config.topic.clone(),
            qos: config.qos,
            table: config.table.clone(),
            database: config.database.clone(),
            sql_template: config.sql_template.clone(),
            mode,
            executor,
            reporter,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<C>> {
        self.executor.connections()
    }

    /// Subscribes and processes messages until `cancel` fires or the source
    /// ends, then drains and shuts down.
    ///
    /// Only a failed subscription is returned as an error; every other
    /// failure is reported as an outcome and the loop keeps going.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<Arc<BridgeStats>, SourceError> {
        self.source.subscribe(&self.topic, self.qos).await?;
        info!(
            "Bridge running in {} mode on topic {}",
            if self.is_batched() { "batched" } else { "immediate" },
            self.topic
        );

        loop {
            let deadline = match &self.mode {
                Mode::Batched { aggregator, .. } => aggregator.deadline(),
                Mode::Immediate => None,
            };

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Shutdown requested");
                    self.drain_accepted().await;
                    break;
                }
                _ = idle_deadline(deadline) => {
                    self.flush_expired().await;
                }
                next = self.source.next_message() => match next {
                    Some(next) => self.handle(next).await,
                    None => {
                        info!("Message source ended");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(self.stats)
    }

    async fn handle(&mut self, next: Result<InboundMessage, SourceError>) {
        match next {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => {
                warn!("Message source error: {e}");
                self.stats.increment(Counter::SourceErrors);
            }
        }
    }

    /// Closes the source to new input and processes what it already
    /// accepted.
    async fn drain_accepted(&mut self) {
        self.source.close_intake().await;
        let mut drained = 0usize;
        while let Some(next) = self.source.next_message().await {
            self.handle(next).await;
            drained += 1;
        }
        if drained > 0 {
            info!("Processed {drained} queued message(s) after shutdown request");
        }
    }

    fn is_batched(&self) -> bool {
        matches!(self.mode, Mode::Batched { .. })
    }

    /// Processes one message to completion.
    pub async fn dispatch(&mut self, msg: InboundMessage) {
        self.stats.increment(Counter::MessagesReceived);
        let payload = msg.payload_str();
        debug!("Message on {}: {}", msg.topic, payload);

        let full = match &self.mode {
            Mode::Batched {
                aggregator,
                records,
            } => match records.build(&msg) {
                Ok(record) => {
                    self.stats.increment(Counter::RecordsBuffered);
                    aggregator.accumulate(record)
                }
                Err(e) => {
                    warn!("Dropping message on {}: {e}", msg.topic);
                    self.stats.increment(Counter::MessagesRejected);
                    None
                }
            },
            Mode::Immediate => {
                let sql = render(
                    &self.sql_template,
                    &msg.topic,
                    &payload,
                    &self.table,
                    &self.database,
                );
                let table = render(&self.table, &msg.topic, &payload, "", &self.database);
                let outcome = self.executor.write_single(&table, &sql).await;
                self.reporter
                    .report(StatusReport::for_message(&msg.topic, &payload, outcome));
                return;
            }
        };

        if let Some(batch) = full {
            write_batch(&self.executor, &self.reporter, &self.stats, batch).await;
        }
    }

    async fn flush_expired(&mut self) {
        let expired = match &self.mode {
            Mode::Batched { aggregator, .. } => aggregator.take_expired(Instant::now()),
            Mode::Immediate => None,
        };
        if let Some(batch) = expired {
            write_batch(&self.executor, &self.reporter, &self.stats, batch).await;
        }
    }

    /// Cancels the idle flush, drains the buffer and awaits its writes, then
    /// closes the storage connection and the source.
    async fn shutdown(&mut self) {
        let remaining = match &self.mode {
            Mode::Batched { aggregator, .. } => aggregator.flush(FlushReason::Shutdown),
            Mode::Immediate => None,
        };
        if let Some(batch) = remaining {
            info!("Flushing {} buffered record(s) before shutdown", batch.len());
            write_batch(&self.executor, &self.reporter, &self.stats, batch).await;
        }

        self.executor.connections().close().await;

        if let Err(e) = self.source.disconnect().await {
            warn!("Error while disconnecting message source: {e}");
        }
        info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelSource;
    use crate::storage::{ConnectionState, MemoryClient};
    use crate::writer::OutcomeStatus;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn config(batch: bool) -> Config {
        Config {
            topic: "sensors/#".to_string(),
            storage_url: "memory:".to_string(),
            database: "power".to_string(),
            table: "air".to_string(),
            sql_template: "INSERT INTO ${table} VALUES (NOW, ${co2}, ${pm25})".to_string(),
            batch,
            batch_size: 3,
            batch_timeout: Duration::from_millis(1000),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_mode_reports_each_message() {
        let client = MemoryClient::new();
        let (source, publisher) = ChannelSource::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(&config(false), client.clone(), source, Reporter::new(tx));

        publisher
            .publish("sensors/a", r#"{"co2": 400, "pm25": 35}"#)
            .await
            .unwrap();
        drop(publisher);

        let stats = bridge.run(CancellationToken::new()).await.unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.status, OutcomeStatus::Success);
        assert_eq!(report.topic.as_deref(), Some("sensors/a"));
        assert_eq!(
            client.executed(),
            vec![
                "USE power".to_string(),
                "INSERT INTO air VALUES (NOW, 400, 35)".to_string()
            ]
        );
        assert_eq!(stats.get(Counter::MessagesReceived), 1);
        assert_eq!(client.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_mode_flushes_on_count() {
        let client = MemoryClient::new();
        let (source, publisher) = ChannelSource::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(&config(true), client.clone(), source, Reporter::new(tx));

        for i in 0..3 {
            let payload = format!(r#"{{"timestamp": {i}, "co2": 400, "pm25": 35}}"#);
            publisher.publish("sensors/a", payload).await.unwrap();
        }
        drop(publisher);

        let stats = bridge.run(CancellationToken::new()).await.unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.flush, Some(FlushReason::Count));
        assert_eq!(report.outcome.rows_written(), 3);
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.get(Counter::FlushesByCount), 1);
        assert_eq!(stats.get(Counter::FlushesOnShutdown), 0);
        assert!(client.executed().contains(
            &"INSERT INTO air (createtime, co2, pm25) VALUES (0, 400, 35), (1, 400, 35), (2, 400, 35)"
                .to_string()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_mode_flushes_on_idle_timeout() {
        let client = MemoryClient::new();
        let (source, publisher) = ChannelSource::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(&config(true), client.clone(), source, Reporter::new(tx));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(bridge.run(cancel.clone()));

        publisher
            .publish("sensors/a", r#"{"timestamp": 1, "co2": 400, "pm25": 35}"#)
            .await
            .unwrap();
        publisher
            .publish("sensors/a", r#"{"timestamp": 2, "co2": 410, "pm25": 36}"#)
            .await
            .unwrap();

        // Paused time auto-advances to the idle deadline once the loop is idle
        let report = rx.recv().await.unwrap();
        assert_eq!(report.flush, Some(FlushReason::Timeout));
        assert_eq!(report.outcome.rows_written(), 2);

        cancel.cancel();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.get(Counter::FlushesByTimeout), 1);
        assert_eq!(stats.get(Counter::FlushesOnShutdown), 0);
        assert_eq!(stats.get(Counter::RowsWritten), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_buffer_before_close() {
        let client = MemoryClient::new().with_exec_delay(Duration::from_millis(50));
        let (source, publisher) = ChannelSource::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(&config(true), client.clone(), source, Reporter::new(tx));
        let cancel = CancellationToken::new();

        publisher
            .publish("sensors/a", r#"{"timestamp": 1, "co2": 400, "pm25": 35}"#)
            .await
            .unwrap();

        let runner = {
            let cancel = cancel.clone();
            tokio::spawn(async move { bridge.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        runner.await.unwrap().unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.flush, Some(FlushReason::Shutdown));
        assert_eq!(report.status, OutcomeStatus::Success);
        assert_eq!(client.executed().len(), 2);
        assert_eq!(client.closes(), 1);
        assert!(publisher.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unroutable_messages_are_dropped_not_fatal() {
        let client = MemoryClient::new();
        let (source, publisher) = ChannelSource::new(8);
        let mut config = config(true);
        config.table = "sensor_${device}".to_string();
        config.batch_size = 1;
        let bridge = Bridge::new(&config, client.clone(), source, Reporter::log_only());

        publisher.publish("sensors/a", r#"{"co2": 400}"#).await.unwrap();
        publisher
            .publish("sensors/a", r#"{"device": "d1", "co2": 400}"#)
            .await
            .unwrap();
        drop(publisher);

        let stats = bridge.run(CancellationToken::new()).await.unwrap();
        assert_eq!(stats.get(Counter::MessagesReceived), 2);
        assert_eq!(stats.get(Counter::MessagesRejected), 1);
        assert_eq!(stats.get(Counter::RowsWritten), 1);
        assert!(client.executed()[1].starts_with("INSERT INTO sensor_d1 "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_closed_after_run() {
        let client = MemoryClient::new();
        let (source, publisher) = ChannelSource::new(8);
        let bridge = Bridge::new(&config(false), client.clone(), source, Reporter::log_only());
        let connections = Arc::clone(bridge.connections());
        publisher.publish("sensors/a", r#"{"co2": 1, "pm25": 2}"#).await.unwrap();
        drop(publisher);

        bridge.run(CancellationToken::new()).await.unwrap();
        assert_eq!(connections.state().await, ConnectionState::Disconnected);
    }
}
