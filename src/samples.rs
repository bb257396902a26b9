use std::collections::VecDeque;
use std::time::Duration;

use crate::types::FailureRecord;

/// Bounded buffer that trims to its most recent `retain` entries whenever a
/// push takes it past `capacity`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    retain: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize, retain: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            retain: retain.clamp(1, capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            let excess = self.items.len() - self.retain;
            self.items.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Recent processing-time samples and failure records.
#[derive(Debug, Clone)]
pub struct SampleStore {
    processing_ms: RingBuffer<f64>,
    failures: RingBuffer<FailureRecord>,
}

impl SampleStore {
    pub fn new(capacity: usize, retain: usize) -> Self {
        Self {
            processing_ms: RingBuffer::new(capacity, retain),
            failures: RingBuffer::new(capacity, retain),
        }
    }

    pub fn record_processing_time(&mut self, duration: Duration) {
        self.processing_ms.push(duration.as_nanos() as f64 / 1_000_000.0);
    }

    /// Mean of the retained samples in milliseconds, 0 when empty.
    pub fn average_processing_time(&self) -> f64 {
        if self.processing_ms.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.processing_ms.iter().sum();
        sum / self.processing_ms.len() as f64
    }

    pub fn sample_count(&self) -> usize {
        self.processing_ms.len()
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    pub fn recent_failures(&self) -> Vec<FailureRecord> {
        self.failures.iter().cloned().collect()
    }
}
