//! Per-destination retry queue for undelivered page commands

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::domain::{TabCommand, TabId};

/// Bounds applied to every destination's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    pub max_pending: usize,
    pub min_age: Duration,
    pub expiry: Duration,
    pub max_attempts: u32,
}

/// A command waiting to be retried
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub destination: TabId,
    pub command: TabCommand,
    /// Delivery attempts made so far
    pub attempt: u32,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    /// Entry for a command whose first delivery just failed
    pub fn first_failure(destination: TabId, command: TabCommand, now: Instant) -> Self {
        Self {
            destination,
            command,
            attempt: 1,
            enqueued_at: now,
        }
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// Result of an enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted; `depth` is the destination's queue length afterwards
    Queued { depth: usize },

    /// The destination's queue was full; the new entry was dropped
    DroppedFull,
}

/// Entries pulled out of one destination's queue by a sweep
#[derive(Debug, Default)]
pub struct SweepBatch {
    /// Retry-eligible entries, oldest first
    pub due: Vec<QueueEntry>,
    /// Entries discarded for age
    pub expired: usize,
    /// Entries discarded for reaching the attempt ceiling
    pub exhausted: usize,
}

/// Bounded FIFO queues keyed by destination
#[derive(Debug)]
pub struct DeliveryQueue {
    policy: QueuePolicy,
    queues: HashMap<TabId, VecDeque<QueueEntry>>,
}

impl DeliveryQueue {
    /// Create an empty queue set
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            queues: HashMap::new(),
        }
    }

    /// The bounds in force
    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Append an entry to its destination's queue
    ///
    /// A full queue drops the new entry and keeps the existing ones.
    pub fn enqueue(&mut self, entry: QueueEntry) -> EnqueueOutcome {
        debug!(destination = %entry.destination, action = entry.command.action(), "DeliveryQueue::enqueue: called");
        let queue = self.queues.entry(entry.destination).or_default();
        if queue.len() >= self.policy.max_pending {
            debug!(destination = %entry.destination, "DeliveryQueue::enqueue: queue full, dropping newest");
            return EnqueueOutcome::DroppedFull;
        }
        queue.push_back(entry);
        EnqueueOutcome::Queued { depth: queue.len() }
    }

    /// Remove and return the destination's retry-eligible entries
    ///
    /// Expired and exhausted entries are discarded and counted. Entries
    /// younger than the minimum age stay queued unless `include_young` is set.
    pub fn take_due(&mut self, destination: TabId, now: Instant, include_young: bool) -> SweepBatch {
        debug!(%destination, include_young, "DeliveryQueue::take_due: called");
        let mut batch = SweepBatch::default();
        let Some(queue) = self.queues.get_mut(&destination) else {
            return batch;
        };

        let mut kept = VecDeque::with_capacity(queue.len());
        for entry in queue.drain(..) {
            let age = entry.age(now);
            if age >= self.policy.expiry {
                batch.expired += 1;
            } else if entry.attempt >= self.policy.max_attempts {
                batch.exhausted += 1;
            } else if age < self.policy.min_age && !include_young {
                kept.push_back(entry);
            } else {
                batch.due.push(entry);
            }
        }

        if kept.is_empty() {
            self.queues.remove(&destination);
        } else {
            *queue = kept;
        }
        batch
    }

    /// Put entries back at the front of their destination's queue
    ///
    /// `entries` must be in original enqueue order; they end up ahead of
    /// anything still queued.
    pub fn restore(&mut self, destination: TabId, entries: Vec<QueueEntry>) {
        if entries.is_empty() {
            return;
        }
        debug!(%destination, count = entries.len(), "DeliveryQueue::restore: called");
        let queue = self.queues.entry(destination).or_default();
        for entry in entries.into_iter().rev() {
            queue.push_front(entry);
        }
    }

    /// Drop everything queued for a destination
    pub fn discard(&mut self, destination: TabId) -> usize {
        debug!(%destination, "DeliveryQueue::discard: called");
        self.queues.remove(&destination).map(|q| q.len()).unwrap_or(0)
    }

    /// Destinations with queued entries, in ascending order
    pub fn destinations(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.queues.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Entries queued for one destination
    pub fn pending(&self, destination: TabId) -> usize {
        self.queues.get(&destination).map(VecDeque::len).unwrap_or(0)
    }

    /// Entries queued across all destinations
    pub fn total_pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Snapshot of one destination's queue, oldest first
    pub fn entries(&self, destination: TabId) -> Vec<QueueEntry> {
        self.queues
            .get(&destination)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> QueuePolicy {
        QueuePolicy {
            max_pending: 3,
            min_age: Duration::from_secs(1),
            expiry: Duration::from_secs(60),
            max_attempts: 3,
        }
    }

    fn volume(v: u8) -> TabCommand {
        TabCommand::SetVolume { volume: v }
    }

    #[test]
    fn test_cap_drops_newest_and_keeps_existing() {
        let mut queue = DeliveryQueue::new(policy());
        let now = Instant::now();

        for v in 1..=3 {
            assert_eq!(
                queue.enqueue(QueueEntry::first_failure(7, volume(v), now)),
                EnqueueOutcome::Queued { depth: usize::from(v) }
            );
        }
        assert_eq!(
            queue.enqueue(QueueEntry::first_failure(7, volume(4), now)),
            EnqueueOutcome::DroppedFull
        );

        let commands: Vec<_> = queue.entries(7).into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec![volume(1), volume(2), volume(3)]);
    }

    #[test]
    fn test_take_due_partitions_by_age() {
        let mut queue = DeliveryQueue::new(policy());
        let start = Instant::now();

        queue.enqueue(QueueEntry::first_failure(1, volume(10), start));
        queue.enqueue(QueueEntry::first_failure(1, volume(20), start + Duration::from_secs(59)));
        queue.enqueue(QueueEntry::first_failure(1, volume(30), start + Duration::from_millis(59_500)));

        let batch = queue.take_due(1, start + Duration::from_secs(60), false);
        assert_eq!(batch.expired, 1);
        assert_eq!(batch.due.len(), 1);
        assert_eq!(batch.due[0].command, volume(20));
        // the young entry stays
        assert_eq!(queue.pending(1), 1);
    }

    #[test]
    fn test_take_due_include_young() {
        let mut queue = DeliveryQueue::new(policy());
        let now = Instant::now();
        queue.enqueue(QueueEntry::first_failure(1, volume(10), now));

        let batch = queue.take_due(1, now, true);
        assert_eq!(batch.due.len(), 1);
        assert_eq!(queue.pending(1), 0);
        assert!(queue.destinations().is_empty());
    }

    #[test]
    fn test_exhausted_entries_discarded() {
        let mut queue = DeliveryQueue::new(policy());
        let start = Instant::now();
        let mut entry = QueueEntry::first_failure(2, volume(10), start);
        entry.attempt = 3;
        queue.enqueue(entry);

        let batch = queue.take_due(2, start + Duration::from_secs(5), false);
        assert_eq!(batch.exhausted, 1);
        assert!(batch.due.is_empty());
    }

    #[test]
    fn test_restore_goes_to_front_in_order() {
        let mut queue = DeliveryQueue::new(policy());
        let start = Instant::now();
        queue.enqueue(QueueEntry::first_failure(3, volume(1), start));
        queue.enqueue(QueueEntry::first_failure(3, volume(2), start));
        queue.enqueue(QueueEntry::first_failure(3, volume(3), start + Duration::from_secs(10)));

        let batch = queue.take_due(3, start + Duration::from_secs(5), false);
        assert_eq!(batch.due.len(), 2);
        queue.restore(3, batch.due);

        let commands: Vec<_> = queue.entries(3).into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec![volume(1), volume(2), volume(3)]);
    }

    #[test]
    fn test_discard_and_totals() {
        let mut queue = DeliveryQueue::new(policy());
        let now = Instant::now();
        queue.enqueue(QueueEntry::first_failure(5, volume(1), now));
        queue.enqueue(QueueEntry::first_failure(4, volume(1), now));
        queue.enqueue(QueueEntry::first_failure(4, volume(2), now));

        assert_eq!(queue.destinations(), vec![4, 5]);
        assert_eq!(queue.total_pending(), 3);
        assert_eq!(queue.discard(4), 2);
        assert_eq!(queue.discard(4), 0);
        assert_eq!(queue.total_pending(), 1);
    }
}
