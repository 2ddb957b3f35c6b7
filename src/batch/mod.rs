//! Record batching.
//!
//! This module provides the buffered record types and the aggregator that
//! decides when buffered records are flushed to the writer.

mod aggregator;
mod types;

pub use aggregator::BatchAggregator;
pub use types::{Batch, BatchConfig, BufferedRecord, FlushReason, RecordGroup};
