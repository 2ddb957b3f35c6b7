//! Write executor.
//!
//! Turns statements and batches into storage calls. Multi-row inserts that
//! fail degrade to one insert per row; every statement goes through
//! [`WriteExecutor::execute_with_retry`], which retries connection-class
//! failures with linear backoff and surfaces everything else immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::outcome::{ExecSuccess, FallbackSummary, RowFailure, WriteOutcome};
use crate::batch::{Batch, RecordGroup};
use crate::error_handling::{get_retry_strategy, BridgeStats, Counter, StorageError, WriteError};
use crate::storage::{ConnectionManager, ExecResult, StorageClient};

/// Retry policy for one statement.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// The `n`-th retry waits `n * base_delay`
    pub base_delay: Duration,
}

/// Executes statements against the storage engine.
pub struct WriteExecutor<C: StorageClient> {
    connections: Arc<ConnectionManager<C>>,
    database: Option<String>,
    policy: RetryPolicy,
    stats: Arc<BridgeStats>,
}

impl<C: StorageClient> WriteExecutor<C> {
    pub fn new(
        connections: Arc<ConnectionManager<C>>,
        database: Option<String>,
        policy: RetryPolicy,
        stats: Arc<BridgeStats>,
    ) -> Self {
        WriteExecutor {
            connections,
            database,
            policy,
            stats,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<C>> {
        &self.connections
    }

    /// Executes `sql` on a live connection, selecting the database first if
    /// one is configured.
    ///
    /// Connection-class failures are retried up to `retry_count` times with
    /// linear backoff; the failed session is discarded before each retry.
    /// Any other failure is returned immediately.
    pub async fn execute_with_retry(&self, sql: &str) -> Result<ExecSuccess, WriteError> {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let max_attempts = self.policy.retry_count.saturating_add(1);

        let result = tokio_retry::RetryIf::start(
            get_retry_strategy(self.policy.base_delay, self.policy.retry_count),
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt > 1 {
                    warn!("Retrying statement (attempt {attempt}/{max_attempts})");
                    self.stats.increment(Counter::Retries);
                }
                self.attempt(sql)
            },
            |e: &StorageError| e.is_connection_class(),
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        let retries = attempts.saturating_sub(1);
        match result {
            Ok(result) => Ok(ExecSuccess { result, retries }),
            Err(source) if source.is_connection_class() => {
                error!("Statement failed after {attempts} attempts: {source}");
                Err(WriteError::RetriesExhausted { attempts, source })
            }
            Err(source) => Err(WriteError::Rejected { source, retries }),
        }
    }

    async fn attempt(&self, sql: &str) -> Result<ExecResult, StorageError> {
        let mut conn = self.connections.ensure_connection().await?;

        let result = match &self.database {
            Some(database) => match conn.select_database(database).await {
                Ok(()) => conn.exec(sql).await,
                Err(e) => Err(e),
            },
            None => conn.exec(sql).await,
        };

        if let Err(e) = &result {
            if e.is_connection_class() {
                debug!("Discarding storage session after connection error: {e}");
                conn.discard().await;
            }
        }
        result
    }

    /// Immediate path: one statement, one outcome, no fallback.
    pub async fn write_single(&self, table: &str, sql: &str) -> WriteOutcome {
        let outcome = self.write_statement(table, 1, sql.to_string()).await;
        if !outcome.is_success() {
            self.stats.increment(Counter::RowsFailed);
        }
        outcome
    }

    /// Writes every group of `batch` independently, in group order.
    ///
    /// A failing group never blocks the others.
    pub async fn write_batch(&self, batch: Batch) -> Vec<WriteOutcome> {
        debug!(
            "Writing batch of {} records ({:?}) to {} table(s)",
            batch.len(),
            batch.reason,
            batch.tables().len()
        );
        let mut outcomes = Vec::new();
        for group in batch.into_groups() {
            outcomes.extend(self.write_group(group).await);
        }
        outcomes
    }

    /// One multi-row insert for the group; on failure, the failure outcome
    /// followed by the per-row fallback summary.
    pub async fn write_group(&self, group: RecordGroup) -> Vec<WriteOutcome> {
        let outcome = self
            .write_statement(&group.table, group.len(), group.insert_statement())
            .await;
        if outcome.is_success() {
            return vec![outcome];
        }

        let summary = self.fallback(&group).await;
        vec![outcome, WriteOutcome::Fallback(summary)]
    }

    async fn fallback(&self, group: &RecordGroup) -> FallbackSummary {
        self.stats.increment(Counter::FallbacksStarted);
        info!(
            "Falling back to {} single-row inserts for table {}",
            group.len(),
            group.table
        );

        let mut succeeded = 0;
        let mut failures = Vec::new();
        for sql in group.row_statements() {
            match self.execute_with_retry(&sql).await {
                Ok(_) => {
                    succeeded += 1;
                    self.stats.increment(Counter::RowsWritten);
                }
                Err(error) => {
                    warn!("Row insert into {} failed: {error}", group.table);
                    self.stats.increment(Counter::RowsFailed);
                    failures.push(RowFailure { sql, error });
                }
            }
        }

        if succeeded > 0 && !failures.is_empty() {
            self.stats.increment(Counter::FallbacksPartial);
        }
        FallbackSummary {
            table: group.table.clone(),
            total: group.len(),
            succeeded,
            failures,
        }
    }

    /// `rows` is the expected row count, used when the engine reports none.
    async fn write_statement(&self, table: &str, rows: usize, sql: String) -> WriteOutcome {
        match self.execute_with_retry(&sql).await {
            Ok(ExecSuccess { result, retries }) => {
                let rows = match usize::try_from(result.rows_affected) {
                    Ok(affected) if affected > 0 => affected,
                    _ => rows,
                };
                self.stats.increment(Counter::StatementsSucceeded);
                self.stats.add(Counter::RowsWritten, rows);
                WriteOutcome::Success {
                    table: table.to_string(),
                    rows,
                    sql,
                    result,
                    retries,
                }
            }
            Err(error) => {
                self.stats.increment(Counter::StatementsFailed);
                let retries = error.retries();
                WriteOutcome::Failure {
                    table: table.to_string(),
                    rows,
                    sql,
                    error,
                    retries,
                }
            }
        }
    }
}
