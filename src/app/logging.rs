//! Throughput logging.

use std::time::Duration;

use log::info;

use crate::error_handling::{BridgeStats, Counter};

/// Messages per second over `elapsed`.
pub fn messages_per_second(messages: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        messages as f64 / secs
    } else {
        0.0
    }
}

/// Logs how many messages and rows went through in `elapsed`.
pub fn log_throughput(elapsed: Duration, stats: &BridgeStats) {
    let messages = stats.get(Counter::MessagesReceived);
    info!(
        "Processed {} messages ({} rows written) in {:.2} seconds (~{:.2} messages/sec)",
        messages,
        stats.get(Counter::RowsWritten),
        elapsed.as_secs_f64(),
        messages_per_second(messages, elapsed)
    );
}
