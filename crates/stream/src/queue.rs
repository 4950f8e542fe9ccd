use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use voxstream_common::{VoxelKey, VoxelState};

/// A pending change: `Some(state)` upserts, `None` deletes.
pub type PendingUpdate = Option<VoxelState>;

/// Scheduler configuration: per-frame work budget and queue bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock ceiling for one drain, in milliseconds.
    pub frame_budget_ms: u64,
    /// Optional cap on items applied per drain.
    pub max_items_per_frame: Option<usize>,
    /// Pending entries allowed before the oldest are evicted.
    pub max_queue_len: usize,
    /// How many of the oldest entries one overflow eviction drops.
    pub overflow_evict_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 14,
            max_items_per_frame: None,
            max_queue_len: 100_000,
            overflow_evict_batch: 10_000,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }
}

/// How an `enqueue` call landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// New entry at the back of the queue.
    Queued,
    /// Replaced the pending entry for the same key in place.
    Coalesced,
}

/// Outcome of one budgeted drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub processed: usize,
    pub remaining: usize,
    pub elapsed: Duration,
}

impl DrainOutcome {
    pub fn any_processed(&self) -> bool {
        self.processed > 0
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }
}

/// Lifetime counters for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub coalesced: u64,
    pub cancelled: u64,
    pub overflow_evicted: u64,
    pub processed: u64,
}

/// Deduplicating, time-boxed queue of pending voxel updates.
///
/// At most one entry per key. A later write for a key already pending
/// replaces the value and keeps the original position. Cancelling is O(1):
/// the key leaves `pending` and its `order` entry goes stale. Each entry
/// carries a sequence number so a stale position never fires for a key
/// enqueued again later.
pub struct UpdateQueue {
    config: SchedulerConfig,
    order: VecDeque<(u64, VoxelKey)>,
    pending: HashMap<VoxelKey, (u64, PendingUpdate)>,
    next_seq: u64,
    stats: QueueStats,
}

impl UpdateQueue {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            order: VecDeque::new(),
            pending: HashMap::new(),
            next_seq: 0,
            stats: QueueStats::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn enqueue(&mut self, key: VoxelKey, update: PendingUpdate) -> Enqueued {
        self.stats.enqueued += 1;
        if let Some((_, slot)) = self.pending.get_mut(&key) {
            *slot = update;
            self.stats.coalesced += 1;
            return Enqueued::Coalesced;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key, (seq, update));
        self.order.push_back((seq, key));
        if self.pending.len() > self.config.max_queue_len {
            self.evict_oldest();
        }
        Enqueued::Queued
    }

    fn evict_oldest(&mut self) {
        let batch = self.config.overflow_evict_batch.clamp(1, self.pending.len());
        let mut evicted = 0usize;
        while evicted < batch && self.pop().is_some() {
            evicted += 1;
        }
        self.stats.overflow_evicted += evicted as u64;
        tracing::warn!(
            evicted,
            remaining = self.pending.len(),
            "update queue overflow, dropped oldest entries"
        );
    }

    /// Withdraw the pending entry for `key`, if any.
    pub fn cancel(&mut self, key: &VoxelKey) -> Option<PendingUpdate> {
        let (_, update) = self.pending.remove(key)?;
        self.stats.cancelled += 1;
        self.compact_if_sparse();
        Some(update)
    }

    /// Drop stale positions once they outnumber live entries.
    fn compact_if_sparse(&mut self) {
        if self.order.len() <= 64 || self.order.len() <= self.pending.len() * 2 {
            return;
        }
        let pending = &self.pending;
        self.order
            .retain(|(seq, key)| pending.get(key).is_some_and(|(live, _)| live == seq));
    }

    /// Pop the oldest entry.
    pub fn pop(&mut self) -> Option<(VoxelKey, PendingUpdate)> {
        while let Some((seq, key)) = self.order.pop_front() {
            if self.pending.get(&key).is_some_and(|(live, _)| *live == seq) {
                return self.pending.remove(&key).map(|(_, update)| (key, update));
            }
        }
        None
    }

    /// Apply entries in queue order until the queue empties, `max_items`
    /// have been applied, or `budget` has elapsed. The clock is checked
    /// between items, so one drain overruns by at most one item.
    pub fn drain<F>(&mut self, budget: Duration, max_items: Option<usize>, mut apply: F) -> DrainOutcome
    where
        F: FnMut(VoxelKey, PendingUpdate),
    {
        let _span = tracing::trace_span!("queue_drain").entered();
        let start = Instant::now();
        let mut processed = 0usize;

        while let Some((key, update)) = self.pop() {
            apply(key, update);
            processed += 1;
            if max_items.is_some_and(|max| processed >= max) || start.elapsed() >= budget {
                break;
            }
        }

        self.stats.processed += processed as u64;
        let outcome = DrainOutcome {
            processed,
            remaining: self.pending.len(),
            elapsed: start.elapsed(),
        };
        tracing::trace!(
            processed = outcome.processed,
            remaining = outcome.remaining,
            elapsed_us = outcome.elapsed.as_micros() as u64,
            "queue drained"
        );
        outcome
    }

    pub fn get(&self, key: &VoxelKey) -> Option<PendingUpdate> {
        self.pending.get(key).map(|(_, update)| *update)
    }

    pub fn contains(&self, key: &VoxelKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending entry. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.order.clear();
        self.pending.clear();
        dropped
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

/// Rolling window of drain durations.
#[derive(Debug, Clone)]
pub struct DrainTimer {
    window: VecDeque<Duration>,
    capacity: usize,
}

impl DrainTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(elapsed);
    }

    pub fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        self.window.iter().sum::<Duration>() / self.window.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.window.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.window.iter().copied().min().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.window.len()
    }
}
