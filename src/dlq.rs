use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::{DeadLetterId, DeadLetterItem};

/// Result of enqueueing a failed delivery.
#[derive(Debug, Clone)]
pub struct Enqueued {
    pub item: DeadLetterItem,

    /// Older items dropped to make room, oldest first.
    pub evicted: Vec<DeadLetterItem>,
}

/// What happened to an item after a failed retry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FailedRetry {
    /// Still below the retry ceiling; stays queued.
    Requeued(DeadLetterItem),

    /// Reached the retry ceiling; removed from the queue.
    Exhausted(DeadLetterItem),
}

/// Bounded, ordered queue of failed webhook deliveries.
///
/// Invariants:
/// - `len() <= capacity`
/// - every queued item has `retry_count < retry_ceiling`
/// - items are ordered by id, oldest first
#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    items: VecDeque<DeadLetterItem>,
    capacity: usize,
    retry_ceiling: u32,
    next_id: u64,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize, retry_ceiling: u32) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            retry_ceiling: retry_ceiling.max(1),
            next_id: 1,
        }
    }

    /// Append a failed delivery. When the queue is full the oldest half is
    /// evicted first, so recent failures win over old ones.
    pub fn enqueue(
        &mut self,
        payload: Vec<u8>,
        error: Option<String>,
        failed_at: DateTime<Utc>,
    ) -> Enqueued {
        let evicted = if self.items.len() >= self.capacity {
            let count = (self.items.len() / 2).max(1);
            self.items.drain(..count).collect()
        } else {
            Vec::new()
        };

        let id = DeadLetterId(self.next_id);
        self.next_id += 1;

        let item = DeadLetterItem::new(id, payload, failed_at, error);
        self.items.push_back(item.clone());

        Enqueued { item, evicted }
    }

    /// Load previously persisted items, replacing the current contents.
    ///
    /// Items already at the retry ceiling are returned as exhausted. If more
    /// than `capacity` remain, the newest are kept and the rest returned as
    /// evicted.
    pub fn restore(&mut self, mut items: Vec<DeadLetterItem>) -> (Vec<DeadLetterItem>, Vec<DeadLetterItem>) {
        items.sort_by_key(|item| item.id);
        self.next_id = items
            .last()
            .map_or(self.next_id, |item| self.next_id.max(item.id.0 + 1));

        let ceiling = self.retry_ceiling;
        let (live, exhausted): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| item.retry_count < ceiling);

        let mut live: VecDeque<_> = live.into();
        let overflow = live.len().saturating_sub(self.capacity);
        let evicted = live.drain(..overflow).collect();

        self.items = live;
        (exhausted, evicted)
    }

    /// Snapshot copy of the queue, oldest first.
    pub fn list(&self) -> Vec<DeadLetterItem> {
        self.items.iter().cloned().collect()
    }

    /// Snapshot of items a sweep at `now` should attempt, plus the number
    /// still waiting out their backoff.
    pub fn due(&self, now: DateTime<Utc>) -> (Vec<DeadLetterItem>, usize) {
        let due: Vec<_> = self
            .items
            .iter()
            .filter(|item| item.is_due(now))
            .cloned()
            .collect();
        let deferred = self.items.len() - due.len();
        (due, deferred)
    }

    pub fn get(&self, id: DeadLetterId) -> Option<&DeadLetterItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn remove(&mut self, id: DeadLetterId) -> Option<DeadLetterItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        self.items.remove(index)
    }

    /// Count a failed retry against the item.
    ///
    /// Returns `None` when the item is no longer queued (evicted while its
    /// retry was in flight).
    pub fn mark_failed(
        &mut self,
        id: DeadLetterId,
        error: String,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Option<FailedRetry> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let item = &mut self.items[index];
        item.retry_count += 1;
        item.last_error = Some(error);
        item.next_attempt_at = next_attempt_at;

        if item.retry_count >= self.retry_ceiling {
            self.items.remove(index).map(FailedRetry::Exhausted)
        } else {
            Some(FailedRetry::Requeued(item.clone()))
        }
    }

    /// Drop every item at or over the retry ceiling.
    pub fn purge_exhausted(&mut self) -> Vec<DeadLetterItem> {
        let ceiling = self.retry_ceiling;
        let mut exhausted = Vec::new();
        self.items.retain(|item| {
            if item.retry_count < ceiling {
                true
            } else {
                exhausted.push(item.clone());
                false
            }
        });
        exhausted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn retry_ceiling(&self) -> u32 {
        self.retry_ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(capacity: usize) -> DeadLetterQueue {
        DeadLetterQueue::new(capacity, 3)
    }

    fn fill(dlq: &mut DeadLetterQueue, count: usize) {
        for i in 0..count {
            dlq.enqueue(format!("payload-{i}").into_bytes(), None, Utc::now());
        }
    }

    #[test]
    fn enqueue_assigns_increasing_ids() {
        let mut dlq = queue(10);
        let first = dlq.enqueue(b"a".to_vec(), Some("boom".into()), Utc::now()).item;
        let second = dlq.enqueue(b"b".to_vec(), None, Utc::now()).item;

        assert!(first.id < second.id);
        assert_eq!(first.retry_count, 0);
        assert_eq!(first.last_error.as_deref(), Some("boom"));
        assert_eq!(dlq.len(), 2);
    }

    #[test]
    fn full_queue_evicts_oldest_half() {
        let mut dlq = queue(100);
        fill(&mut dlq, 100);
        assert_eq!(dlq.len(), 100);

        let enqueued = dlq.enqueue(b"newest".to_vec(), None, Utc::now());
        assert_eq!(enqueued.evicted.len(), 50);
        assert_eq!(enqueued.evicted[0].id, DeadLetterId(1));
        assert_eq!(dlq.len(), 51);
        assert_eq!(dlq.list()[0].id, DeadLetterId(51));
        assert_eq!(dlq.list().last().map(|i| i.id), Some(enqueued.item.id));
    }

    #[test]
    fn capacity_of_one_still_bounds_queue() {
        let mut dlq = queue(1);
        fill(&mut dlq, 5);
        assert_eq!(dlq.len(), 1);
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let mut dlq = queue(10);
        fill(&mut dlq, 2);
        let snapshot = dlq.list();

        let id = snapshot[0].id;
        dlq.mark_failed(id, "again".into(), None);
        dlq.remove(snapshot[1].id);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].retry_count, 0);
        assert_eq!(dlq.len(), 1);
    }

    #[test]
    fn mark_failed_removes_item_at_ceiling() {
        let mut dlq = queue(10);
        let id = dlq.enqueue(b"x".to_vec(), None, Utc::now()).item.id;

        for expected in 1..3 {
            match dlq.mark_failed(id, "nope".into(), None) {
                Some(FailedRetry::Requeued(item)) => assert_eq!(item.retry_count, expected),
                other => panic!("unexpected {other:?}"),
            }
        }

        match dlq.mark_failed(id, "final".into(), None) {
            Some(FailedRetry::Exhausted(item)) => {
                assert_eq!(item.retry_count, 3);
                assert_eq!(item.last_error.as_deref(), Some("final"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(dlq.is_empty());
        assert!(dlq.mark_failed(id, "gone".into(), None).is_none());
    }

    #[test]
    fn due_skips_items_waiting_on_backoff() {
        let now = Utc::now();
        let mut dlq = queue(10);
        fill(&mut dlq, 2);
        let later = now + chrono::Duration::seconds(30);
        let first = dlq.list()[0].id;
        dlq.mark_failed(first, "slow down".into(), Some(later));

        let (due, deferred) = dlq.due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(deferred, 1);

        let (due, deferred) = dlq.due(later);
        assert_eq!(due.len(), 2);
        assert_eq!(deferred, 0);
    }

    #[test]
    fn restore_drops_exhausted_and_keeps_newest() {
        let now = Utc::now();
        let mut items: Vec<_> = (1..=5)
            .map(|i| DeadLetterItem::new(DeadLetterId(i), b"p".to_vec(), now, None))
            .collect();
        items[0].retry_count = 3;

        let mut dlq = queue(3);
        let (exhausted, evicted) = dlq.restore(items);

        assert_eq!(exhausted.len(), 1);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, DeadLetterId(2));
        let ids: Vec<_> = dlq.list().iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![3, 4, 5]);

        let next = dlq.enqueue(b"q".to_vec(), None, now);
        assert_eq!(next.item.id, DeadLetterId(6));
    }

    #[test]
    fn purge_exhausted_retains_live_items() {
        let now = Utc::now();
        let mut dlq = queue(10);
        let mut items: Vec<_> = (1..=3)
            .map(|i| DeadLetterItem::new(DeadLetterId(i), b"p".to_vec(), now, None))
            .collect();
        items[1].retry_count = 2;
        dlq.restore(items);

        assert!(dlq.purge_exhausted().is_empty());
        assert_eq!(dlq.len(), 3);
    }
}
