//! Generic micro-batch accumulator.
//!
//! Collects items and signals a flush when either the size threshold or
//! time window is reached, whichever comes first. This balances throughput
//! (larger batches) with latency (time-bounded delivery). Used directly by
//! the Worker for queue draining and reused by kb-monitor for its
//! `session_metrics_realtime` writer.

use std::time::{Duration, Instant};

pub struct MicroBatcher<T> {
    buffer: Vec<T>,
    max_size: usize,
    max_wait: Duration,
    batch_started: Option<Instant>,
}

impl<T> MicroBatcher<T> {
    /// - `max_size`: flush when this many items are buffered.
    /// - `max_wait`: flush when this duration has elapsed since the first
    ///   item in the current batch was pushed.
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size),
            max_size,
            max_wait,
            batch_started: None,
        }
    }

    /// Add one item. Starts the batch timer on the first push after a flush.
    pub fn push(&mut self, item: T) {
        if self.batch_started.is_none() {
            self.batch_started = Some(Instant::now());
        }
        self.buffer.push(item);
    }

    pub fn extend(&mut self, items: Vec<T>) {
        if self.batch_started.is_none() && !items.is_empty() {
            self.batch_started = Some(Instant::now());
        }
        self.buffer.extend(items);
    }

    /// `true` when the buffer has reached `max_size` or `max_wait` has
    /// elapsed since the batch started.
    pub fn should_flush(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        if self.buffer.len() >= self.max_size {
            return true;
        }
        if let Some(started) = self.batch_started {
            if started.elapsed() >= self.max_wait {
                return true;
            }
        }
        false
    }

    /// Flush the current batch, returning all accumulated items. Resets the
    /// batcher for the next batch.
    pub fn flush(&mut self) -> Vec<T> {
        self.batch_started = None;
        std::mem::take(&mut self.buffer)
    }

    pub fn try_flush(&mut self) -> Option<Vec<T>> {
        if self.should_flush() {
            Some(self.flush())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_on_size() {
        let mut batcher = MicroBatcher::new(3, Duration::from_secs(60));
        batcher.extend(vec![1, 2, 3]);
        assert!(batcher.should_flush());
    }

    #[test]
    fn no_flush_below_size() {
        let mut batcher = MicroBatcher::new(5, Duration::from_secs(60));
        batcher.extend(vec![1, 2]);
        assert!(!batcher.should_flush());
    }

    #[test]
    fn flush_on_timeout() {
        let mut batcher = MicroBatcher::new(100, Duration::from_millis(10));
        batcher.push(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(batcher.should_flush());
    }

    #[test]
    fn try_flush_returns_none_when_not_ready() {
        let mut batcher = MicroBatcher::new(10, Duration::from_secs(60));
        batcher.extend(vec![1, 2]);
        assert!(batcher.try_flush().is_none());
    }

    #[test]
    fn try_flush_returns_some_when_ready() {
        let mut batcher: MicroBatcher<i32> = MicroBatcher::new(2, Duration::from_secs(60));
        batcher.extend(vec![1, 2]);
        let batch = batcher.try_flush();
        assert_eq!(batch.unwrap().len(), 2);
    }

    #[test]
    fn flush_resets_state() {
        let mut batcher = MicroBatcher::new(2, Duration::from_secs(60));
        batcher.extend(vec![1, 2, 3]);
        let flushed = batcher.flush();
        assert_eq!(flushed.len(), 3);
        assert_eq!(batcher.len(), 0);
        assert!(batcher.is_empty());
        assert!(!batcher.should_flush());
    }

    #[test]
    fn empty_extend_does_not_start_timer() {
        let mut batcher: MicroBatcher<i32> = MicroBatcher::new(5, Duration::from_millis(1));
        batcher.extend(vec![]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!batcher.should_flush());
    }

    #[test]
    fn multiple_pushes_accumulate() {
        let mut batcher = MicroBatcher::new(10, Duration::from_secs(60));
        batcher.extend(vec![1, 2]);
        batcher.extend(vec![3, 4, 5]);
        assert_eq!(batcher.len(), 5);
        let flushed = batcher.flush();
        assert_eq!(flushed, vec![1, 2, 3, 4, 5]);
    }
}
