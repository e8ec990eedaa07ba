//! Per-thread statistics counters for queue operations.
//!
//! Every counter lives in thread-local storage and is bumped on the owning
//! thread only, so the hot paths never touch shared cache lines for
//! bookkeeping. Aggregation across threads is the caller's job: each worker
//! calls [`take`] when it finishes and merges the snapshot into whatever
//! accumulator the harness keeps.
//!
//! The counters are diagnostics, never part of queue correctness.

use std::cell::Cell;

/// Operation counters for one thread.
///
/// Waits count suspensions through the blocking wrapper (yield, event-count
/// wait, condvar wait, semaphore block, or futex wait); retries count failed
/// atomic updates inside the lock-free core; wraps count generation
/// realignments observed under bursty contention.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Enqueue attempts that found the queue full
    pub queue_full_count: u32,
    /// Dequeue attempts that found the queue empty
    pub queue_empty_count: u32,
    /// Producer suspensions waiting for a non-full queue
    pub producer_waits: u32,
    /// Consumer suspensions waiting for a non-empty queue
    pub consumer_waits: u32,
    /// Failed producer slot updates (another producer won the CAS)
    pub producer_retries: u32,
    /// Failed consumer head updates (another consumer won the CAS)
    pub consumer_retries: u32,
    /// Producer observations of a slot a full generation ahead of its tail
    pub producer_wraps: u32,
    /// Consumer observations of a slot a full generation ahead of its head
    pub consumer_wraps: u32,
    /// Producer observations of a head staler than the slot sequence allows
    pub invalid_head_sync: u32,
}

impl QueueStats {
    /// Create a zeroed counter set
    pub const fn new() -> Self {
        Self {
            queue_full_count: 0,
            queue_empty_count: 0,
            producer_waits: 0,
            consumer_waits: 0,
            producer_retries: 0,
            consumer_retries: 0,
            producer_wraps: 0,
            consumer_wraps: 0,
            invalid_head_sync: 0,
        }
    }

    /// Fold another thread's counters into this accumulator
    pub fn merge(&mut self, other: &QueueStats) {
        self.queue_full_count = self.queue_full_count.wrapping_add(other.queue_full_count);
        self.queue_empty_count = self.queue_empty_count.wrapping_add(other.queue_empty_count);
        self.producer_waits = self.producer_waits.wrapping_add(other.producer_waits);
        self.consumer_waits = self.consumer_waits.wrapping_add(other.consumer_waits);
        self.producer_retries = self.producer_retries.wrapping_add(other.producer_retries);
        self.consumer_retries = self.consumer_retries.wrapping_add(other.consumer_retries);
        self.producer_wraps = self.producer_wraps.wrapping_add(other.producer_wraps);
        self.consumer_wraps = self.consumer_wraps.wrapping_add(other.consumer_wraps);
        self.invalid_head_sync = self.invalid_head_sync.wrapping_add(other.invalid_head_sync);
    }
}

thread_local! {
    static TLS_STATS: Cell<QueueStats> = const { Cell::new(QueueStats::new()) };
}

/// Read the calling thread's counters without clearing them
pub fn snapshot() -> QueueStats {
    TLS_STATS.with(Cell::get)
}

/// Drain the calling thread's counters, resetting them to zero
pub fn take() -> QueueStats {
    TLS_STATS.with(|cell| cell.replace(QueueStats::new()))
}

/// Update the calling thread's counters in place
#[inline]
pub(crate) fn with<F: FnOnce(&mut QueueStats)>(f: F) {
    TLS_STATS.with(|cell| {
        let mut stats = cell.get();
        f(&mut stats);
        cell.set(stats);
    });
}
