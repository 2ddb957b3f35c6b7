//! Outbound status reports.
//!
//! Every write outcome is logged and, when a consumer is attached, sent as a
//! [`StatusReport`] on an unbounded channel. The binary prints them as JSON
//! lines.

use chrono::{SecondsFormat, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::batch::FlushReason;
use crate::config::MAX_REPORTED_SQL_LENGTH;
use crate::writer::{OutcomeStatus, WriteOutcome};

/// One reported outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// RFC 3339 time the report was produced
    pub timestamp: String,
    pub status: OutcomeStatus,
    /// Set for batched writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush: Option<FlushReason>,
    /// Originating topic, set for immediate writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Originating payload, set for immediate writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub outcome: WriteOutcome,
}

impl StatusReport {
    fn new(outcome: WriteOutcome) -> Self {
        let mut outcome = outcome;
        shorten_outcome(&mut outcome);
        StatusReport {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            status: outcome.status(),
            flush: None,
            topic: None,
            payload: None,
            outcome,
        }
    }

    /// Report for an immediate-mode write of one message.
    pub fn for_message(topic: &str, payload: &str, outcome: WriteOutcome) -> Self {
        StatusReport {
            topic: Some(topic.to_string()),
            payload: Some(payload.to_string()),
            ..Self::new(outcome)
        }
    }

    /// Report for one outcome of a batch flush.
    pub fn for_flush(reason: FlushReason, outcome: WriteOutcome) -> Self {
        StatusReport {
            flush: Some(reason),
            ..Self::new(outcome)
        }
    }
}

fn shorten(sql: &mut String) {
    if sql.len() <= MAX_REPORTED_SQL_LENGTH {
        return;
    }
    let mut end = MAX_REPORTED_SQL_LENGTH;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    sql.truncate(end);
    sql.push_str("...");
}

fn shorten_outcome(outcome: &mut WriteOutcome) {
    match outcome {
        WriteOutcome::Success { sql, .. } | WriteOutcome::Failure { sql, .. } => shorten(sql),
        WriteOutcome::Fallback(summary) => {
            for failure in &mut summary.failures {
                shorten(&mut failure.sql);
            }
        }
    }
}

/// Logs outcomes and forwards them to the report consumer.
#[derive(Clone, Default)]
pub struct Reporter {
    tx: Option<UnboundedSender<StatusReport>>,
}

impl Reporter {
    pub fn new(tx: UnboundedSender<StatusReport>) -> Self {
        Reporter { tx: Some(tx) }
    }

    /// Reporter that only logs.
    pub fn log_only() -> Self {
        Reporter::default()
    }

    pub fn report(&self, report: StatusReport) {
        log_outcome(&report.outcome);
        if let Some(tx) = &self.tx {
            if tx.send(report).is_err() {
                debug!("Report consumer is gone, dropping status report");
            }
        }
    }
}

fn log_outcome(outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Success {
            table,
            rows,
            retries,
            ..
        } => {
            if *retries > 0 {
                info!("Wrote {rows} row(s) to {table} after {retries} retries");
            } else {
                info!("Wrote {rows} row(s) to {table}");
            }
        }
        WriteOutcome::Failure {
            table, sql, error, ..
        } => {
            error!("Write to {table} failed: {error} (sql: {sql})");
        }
        WriteOutcome::Fallback(summary) => match summary.status() {
            OutcomeStatus::Success => info!(
                "Row fallback for {} recovered all {} rows",
                summary.table, summary.total
            ),
            OutcomeStatus::Partial => warn!(
                "Row fallback for {}: {}/{} rows written, {} failed",
                summary.table,
                summary.succeeded,
                summary.total,
                summary.failures.len()
            ),
            OutcomeStatus::Failure => error!(
                "Row fallback for {}: all {} rows failed",
                summary.table, summary.total
            ),
        },
    }
}
