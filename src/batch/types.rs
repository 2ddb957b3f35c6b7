//! Batch data structures.
//!
//! Records are buffered one by one and grouped at flush time into one
//! [`RecordGroup`] per target table and column shape. Each group becomes one
//! multi-row insert.

use std::time::Duration;

use serde::Serialize;

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT_MS};
use crate::storage::insert::{multi_row_insert, single_row_insert};

/// Flush thresholds.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Buffered record count that flushes immediately
    pub batch_size: usize,
    /// Idle window after the first unflushed record
    pub batch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: Duration::from_millis(DEFAULT_BATCH_TIMEOUT_MS),
        }
    }
}

/// Why a flush happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Buffered record count reached the batch size
    Count,
    /// Idle window elapsed
    Timeout,
    /// Final drain during shutdown
    Shutdown,
}

/// One buffered row waiting for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedRecord {
    pub table: String,
    pub columns: Vec<String>,
    /// Parenthesized tuple literal, e.g. `(1700000000000, 412, 35)`
    pub values: String,
}

impl BufferedRecord {
    pub fn new(table: impl Into<String>, columns: Vec<String>, values: impl Into<String>) -> Self {
        BufferedRecord {
            table: table.into(),
            columns,
            values: values.into(),
        }
    }
}

/// Rows for one table sharing one column header, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroup {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

impl RecordGroup {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One multi-row insert covering every row of the group.
    pub fn insert_statement(&self) -> String {
        multi_row_insert(&self.table, &self.columns, &self.values)
    }

    /// One single-row insert per row, used by the per-row fallback.
    pub fn row_statements(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|tuple| single_row_insert(&self.table, &self.columns, tuple))
            .collect()
    }
}

/// Records taken from the buffer by one flush, grouped for writing.
#[derive(Debug, Clone)]
pub struct Batch {
    pub reason: FlushReason,
    groups: Vec<RecordGroup>,
}

impl Batch {
    /// Groups `records` by `(table, columns)`, keeping first-seen group order
    /// and arrival order within each group.
    ///
    /// A table receiving records of different column shapes yields one group
    /// per shape, so tuples are never written under a foreign header.
    pub fn from_records(records: Vec<BufferedRecord>, reason: FlushReason) -> Self {
        let mut groups: Vec<RecordGroup> = Vec::new();
        for record in records {
            match groups
                .iter_mut()
                .find(|g| g.table == record.table && g.columns == record.columns)
            {
                Some(group) => group.values.push(record.values),
                None => {
                    if groups.iter().any(|g| g.table == record.table) {
                        log::warn!(
                            "Table {} received records with different columns ({}); writing them as a separate insert",
                            record.table,
                            record.columns.join(", ")
                        );
                    }
                    groups.push(RecordGroup {
                        table: record.table,
                        columns: record.columns,
                        values: vec![record.values],
                    });
                }
            }
        }
        Batch { reason, groups }
    }

    pub fn groups(&self) -> &[RecordGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<RecordGroup> {
        self.groups
    }

    /// Total buffered records across groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(RecordGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Distinct target tables, first-seen order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for group in &self.groups {
            if !tables.contains(&group.table.as_str()) {
                tables.push(&group.table);
            }
        }
        tables
    }
}
