//! Write outcomes.
//!
//! Every write attempt is converted into one of these values; nothing the
//! storage engine does escapes the executor as an `Err`.

use std::fmt::Display;

use serde::{Serialize, Serializer};

use crate::error_handling::WriteError;
use crate::storage::ExecResult;

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Successful execution of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecSuccess {
    pub result: ExecResult,
    /// Retries spent on connection-class failures before the success
    pub retries: u32,
}

/// Overall status of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    /// Some rows of a group were persisted during fallback, some were not
    Partial,
    Failure,
}

/// One row that could not be written during fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub sql: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: WriteError,
}

/// Result of degrading a failed multi-row insert to one insert per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackSummary {
    pub table: String,
    /// Rows attempted
    pub total: usize,
    /// Rows persisted
    pub succeeded: usize,
    pub failures: Vec<RowFailure>,
}

impl FallbackSummary {
    pub fn status(&self) -> OutcomeStatus {
        if self.failures.is_empty() {
            OutcomeStatus::Success
        } else if self.succeeded > 0 {
            OutcomeStatus::Partial
        } else {
            OutcomeStatus::Failure
        }
    }
}

/// Outcome of one write: a statement, or the per-row fallback of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The statement was executed.
    Success {
        table: String,
        /// Rows carried by the statement
        rows: usize,
        sql: String,
        result: ExecResult,
        retries: u32,
    },
    /// The statement failed after the retry policy was applied.
    Failure {
        table: String,
        rows: usize,
        sql: String,
        #[serde(serialize_with = "serialize_display")]
        error: WriteError,
        retries: u32,
    },
    /// Per-row fallback after a failed multi-row insert.
    Fallback(FallbackSummary),
}

impl WriteOutcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            WriteOutcome::Success { .. } => OutcomeStatus::Success,
            WriteOutcome::Failure { .. } => OutcomeStatus::Failure,
            WriteOutcome::Fallback(summary) => summary.status(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            WriteOutcome::Success { table, .. } | WriteOutcome::Failure { table, .. } => table,
            WriteOutcome::Fallback(summary) => &summary.table,
        }
    }

    /// Rows this outcome persisted.
    pub fn rows_written(&self) -> usize {
        match self {
            WriteOutcome::Success { rows, .. } => *rows,
            WriteOutcome::Failure { .. } => 0,
            WriteOutcome::Fallback(summary) => summary.succeeded,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == OutcomeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::StorageError;

    fn rejected(msg: &str) -> WriteError {
        WriteError::Rejected {
            source: StorageError::Statement(msg.to_string()),
            retries: 0,
        }
    }

    fn summary(succeeded: usize, failed: usize) -> FallbackSummary {
        FallbackSummary {
            table: "air".to_string(),
            total: succeeded + failed,
            succeeded,
            failures: (0..failed)
                .map(|i| RowFailure {
                    sql: format!("INSERT INTO air (ts) VALUES ({i})"),
                    error: rejected("bad row"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_fallback_status() {
        assert_eq!(summary(3, 0).status(), OutcomeStatus::Success);
        assert_eq!(summary(2, 1).status(), OutcomeStatus::Partial);
        assert_eq!(summary(0, 3).status(), OutcomeStatus::Failure);
    }

    #[test]
    fn test_rows_written() {
        let outcome = WriteOutcome::Fallback(summary(2, 1));
        assert_eq!(outcome.rows_written(), 2);
        assert_eq!(outcome.table(), "air");
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_failure_serializes_error_text() {
        let outcome = WriteOutcome::Failure {
            table: "air".to_string(),
            rows: 2,
            sql: "INSERT INTO air (ts) VALUES (1), (2)".to_string(),
            error: rejected("no such table: air"),
            retries: 0,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "failure");
        assert_eq!(json["error"], "statement rejected: no such table: air");
        assert_eq!(json["sql"], "INSERT INTO air (ts) VALUES (1), (2)");
    }

    #[test]
    fn test_fallback_serializes_flat() {
        let json = serde_json::to_value(WriteOutcome::Fallback(summary(1, 1))).unwrap();
        assert_eq!(json["kind"], "fallback");
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failures"][0]["error"], "statement rejected: bad row");
    }
}
