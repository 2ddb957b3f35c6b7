//! Bridge statistics tracking.
//!
//! Thread-safe counters for messages, statements, rows and retries,
//! incremented by the writer and the orchestrator and printed at shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

/// Things the bridge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum Counter {
    /// Messages dequeued from the source
    MessagesReceived,
    /// Messages dropped before reaching storage (e.g. unbuildable record)
    MessagesRejected,
    /// Records added to the batch buffer
    RecordsBuffered,
    /// Flushes triggered by the record count
    FlushesByCount,
    /// Flushes triggered by the idle timer
    FlushesByTimeout,
    /// Final flush during shutdown
    FlushesOnShutdown,
    /// Statements the storage engine accepted
    StatementsSucceeded,
    /// Statements that failed after the retry policy
    StatementsFailed,
    /// Multi-row inserts that degraded to per-row inserts
    FallbacksStarted,
    /// Fallbacks where some but not all rows were written
    FallbacksPartial,
    /// Rows persisted
    RowsWritten,
    /// Rows that could not be persisted
    RowsFailed,
    /// Retries spent on connection-class failures
    Retries,
    /// Errors observed on the message source
    SourceErrors,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::MessagesReceived => "Messages received",
            Counter::MessagesRejected => "Messages rejected",
            Counter::RecordsBuffered => "Records buffered",
            Counter::FlushesByCount => "Flushes (batch size)",
            Counter::FlushesByTimeout => "Flushes (idle timeout)",
            Counter::FlushesOnShutdown => "Flushes (shutdown)",
            Counter::StatementsSucceeded => "Statements succeeded",
            Counter::StatementsFailed => "Statements failed",
            Counter::FallbacksStarted => "Per-row fallbacks",
            Counter::FallbacksPartial => "Partial fallbacks",
            Counter::RowsWritten => "Rows written",
            Counter::RowsFailed => "Rows failed",
            Counter::Retries => "Connection retries",
            Counter::SourceErrors => "Source errors",
        }
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe bridge statistics tracker.
///
/// Every [`Counter`] is initialized to zero on creation, so increments never
/// allocate and the struct can be shared across tasks behind an `Arc`.
pub struct BridgeStats {
    counters: HashMap<Counter, AtomicUsize>,
}

impl BridgeStats {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for counter in Counter::iter() {
            counters.insert(counter, AtomicUsize::new(0));
        }
        BridgeStats { counters }
    }

    /// Increment a counter by one.
    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Increment a counter by `amount`.
    pub fn add(&self, counter: Counter, amount: usize) {
        if amount == 0 {
            return;
        }
        if let Some(c) = self.counters.get(&counter) {
            c.fetch_add(amount, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter {:?} which is not in the map. \
                 This indicates a bug in BridgeStats initialization.",
                counter
            );
        }
    }

    /// Current value of a counter.
    pub fn get(&self, counter: Counter) -> usize {
        self.counters
            .get(&counter)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Snapshot of all non-zero counters in declaration order.
    pub fn snapshot(&self) -> Vec<(Counter, usize)> {
        Counter::iter()
            .map(|c| (c, self.get(c)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}
