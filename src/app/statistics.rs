//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{BridgeStats, Counter};

/// Prints every non-zero counter to the log.
pub fn print_bridge_statistics(stats: &BridgeStats) {
    let snapshot = stats.snapshot();
    if snapshot.is_empty() {
        info!("No messages were processed");
        return;
    }

    info!("Bridge statistics:");
    for counter in Counter::iter() {
        let count = stats.get(counter);
        if count > 0 {
            info!("   {}: {}", counter.as_str(), count);
        }
    }
}
