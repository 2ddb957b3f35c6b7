//! Batch aggregator.
//!
//! Buffers records and decides when to flush: when the buffered count reaches
//! the batch size, or when the idle window since the first unflushed record
//! has elapsed, whichever comes first. The buffer and its deadline sit behind
//! one mutex so the swap performed by a flush is atomic with respect to
//! concurrent `accumulate` calls.
//!
//! The aggregator does not own a timer task. It exposes the pending
//! [`deadline`](BatchAggregator::deadline); the worker loop sleeps until it
//! and then calls [`take_expired`](BatchAggregator::take_expired).

use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::time::Instant;

use super::types::{Batch, BatchConfig, BufferedRecord, FlushReason};

#[derive(Default)]
struct Buffer {
    records: Vec<BufferedRecord>,
    deadline: Option<Instant>,
}

/// Accumulates records until a flush condition fires.
pub struct BatchAggregator {
    config: BatchConfig,
    buffer: Mutex<Buffer>,
}

impl BatchAggregator {
    pub fn new(config: BatchConfig) -> Self {
        BatchAggregator {
            config,
            buffer: Mutex::new(Buffer::default()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffers one record.
    ///
    /// Returns the batch to write when the count threshold is reached; the
    /// pending idle deadline is cancelled in that case. Otherwise arms the idle
    /// deadline if this is the first unflushed record.
    pub fn accumulate(&self, record: BufferedRecord) -> Option<Batch> {
        let mut buffer = self.lock();
        buffer.records.push(record);

        if buffer.records.len() >= self.config.batch_size {
            buffer.deadline = None;
            let records = std::mem::take(&mut buffer.records);
            debug!("Batch size {} reached, flushing", records.len());
            return Some(Batch::from_records(records, FlushReason::Count));
        }

        if buffer.deadline.is_none() {
            buffer.deadline = Some(Instant::now() + self.config.batch_timeout);
        }
        None
    }

    /// When the idle flush is due, if any records are waiting.
    pub fn deadline(&self) -> Option<Instant> {
        self.lock().deadline
    }

    /// Takes the buffered records if the idle deadline has passed.
    ///
    /// The deadline is cleared before the records are taken, so a stale timer
    /// can never fire a second flush for the same records.
    pub fn take_expired(&self, now: Instant) -> Option<Batch> {
        let mut buffer = self.lock();
        match buffer.deadline {
            Some(deadline) if deadline <= now => {
                buffer.deadline = None;
                let records = std::mem::take(&mut buffer.records);
                if records.is_empty() {
                    return None;
                }
                debug!("Batch timeout elapsed, flushing {} records", records.len());
                Some(Batch::from_records(records, FlushReason::Timeout))
            }
            _ => None,
        }
    }

    /// Unconditionally swaps the buffer for an empty one and cancels the
    /// deadline. Returns `None` when nothing was buffered.
    pub fn flush(&self, reason: FlushReason) -> Option<Batch> {
        let mut buffer = self.lock();
        buffer.deadline = None;
        let records = std::mem::take(&mut buffer.records);
        if records.is_empty() {
            None
        } else {
            Some(Batch::from_records(records, reason))
        }
    }

    /// Records currently buffered.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(table: &str, n: usize) -> BufferedRecord {
        BufferedRecord::new(
            table,
            vec!["ts".to_string(), "v".to_string()],
            format!("({n}, {n})"),
        )
    }

    fn aggregator(size: usize, timeout_ms: u64) -> BatchAggregator {
        BatchAggregator::new(BatchConfig {
            batch_size: size,
            batch_timeout: Duration::from_millis(timeout_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_threshold_flushes_and_cancels_deadline() {
        let agg = aggregator(10, 1000);
        for i in 0..9 {
            assert!(agg.accumulate(record("air", i)).is_none());
        }
        assert!(agg.deadline().is_some());

        let batch = agg.accumulate(record("air", 9)).expect("tenth record flushes");
        assert_eq!(batch.reason, FlushReason::Count);
        assert_eq!(batch.len(), 10);
        assert!(agg.is_empty());
        assert_eq!(agg.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_armed_by_first_record_only() {
        let agg = aggregator(10, 1000);
        let start = Instant::now();
        agg.accumulate(record("air", 0));
        let first_deadline = agg.deadline().unwrap();
        assert_eq!(first_deadline, start + Duration::from_millis(1000));

        tokio::time::advance(Duration::from_millis(400)).await;
        agg.accumulate(record("air", 1));
        assert_eq!(agg.deadline(), Some(first_deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_expired_respects_deadline() {
        let agg = aggregator(10, 1000);
        for i in 0..9 {
            agg.accumulate(record("air", i));
        }

        assert!(agg.take_expired(Instant::now()).is_none());
        tokio::time::advance(Duration::from_millis(1000)).await;

        let batch = agg.take_expired(Instant::now()).expect("deadline passed");
        assert_eq!(batch.reason, FlushReason::Timeout);
        assert_eq!(batch.len(), 9);
        assert_eq!(agg.deadline(), None);
        // A second check finds nothing: the deadline was cleared before the flush
        assert!(agg.take_expired(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_drains_everything() {
        let agg = aggregator(10, 1000);
        agg.accumulate(record("a", 1));
        agg.accumulate(record("b", 2));

        let batch = agg.flush(FlushReason::Shutdown).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tables(), vec!["a", "b"]);
        assert!(agg.flush(FlushReason::Shutdown).is_none());
        assert_eq!(agg.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_one_flushes_every_record() {
        let agg = aggregator(1, 1000);
        assert!(agg.accumulate(record("a", 1)).is_some());
        assert!(agg.accumulate(record("a", 2)).is_some());
        assert_eq!(agg.deadline(), None);
    }
}
