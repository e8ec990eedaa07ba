//! Lock-free bounded ring queue.
//!
//! Each slot carries a sequence tag naming the ring generation it currently
//! belongs to. For a producer or consumer whose cursor is `s`, the slot at
//! index `s & mask` is:
//!
//! - empty and writable at `s` iff `slot.seq == s & seq_mask`
//! - full and readable at `s` iff `slot.seq == (s & seq_mask) + capacity`
//!
//! A successful enqueue advances the slot sequence by `capacity`. Dequeues
//! never touch the slot sequence: the post-enqueue value is already what the
//! producer one generation later expects, because `(s + capacity) &
//! seq_mask` equals `(s & seq_mask) + capacity`. All cursor comparisons use
//! wrap-agnostic signed-difference ordering, so sequences are free to wrap
//! the 64-bit space.
//!
//! Multi-producer enqueues bind the sequence and payload transitions with a
//! 16-byte compare-exchange of the whole slot; the shared tail is only an
//! optimization, advanced best-effort after the slot itself has moved.

use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};

use crate::constants::{MIN_QUEUE_CAPACITY, Q_CLOSED};
use crate::error::{Result, SurgeError};
use crate::queue::slot::{dcas16_supported, Slot};
use crate::queue::QueueMode;
use crate::stats;

/// Cache-line padded cursor to keep head and tail off each other's lines.
#[repr(align(64))]
#[derive(Debug)]
struct PaddedCursor {
    seq: AtomicU64,
}

impl PaddedCursor {
    fn new(initial: u64) -> Self {
        Self {
            seq: AtomicU64::new(initial),
        }
    }
}

/// Lock-free bounded MPMC queue over machine-word payloads.
///
/// Non-blocking: [`try_enqueue`](RingCore::try_enqueue) and
/// [`try_dequeue`](RingCore::try_dequeue) never suspend the calling thread.
/// Single-producer and single-consumer modes select straight-line fast
/// paths; the mode is trusted, and concurrent producers on a
/// single-producer queue (or consumers on a single-consumer queue) are a
/// contract violation.
#[derive(Debug)]
pub struct RingCore {
    capacity: u32,
    mask: u64,
    seq_mask: u64,
    sp_mode: bool,
    sc_mode: bool,
    closed: AtomicBool,
    buffer: Box<[Slot]>,
    /// Next full slot to dequeue; starts one capacity ahead of the tail.
    head: PaddedCursor,
    /// Next empty slot to enqueue.
    tail: PaddedCursor,
}

impl RingCore {
    /// Create a queue with the given capacity and concurrency mode.
    ///
    /// The capacity must be a power of two and at least 2. Modes with more
    /// than one producer additionally require `cmpxchg16b`.
    pub fn new(capacity: u32, mode: QueueMode) -> Result<Self> {
        Self::with_modes(capacity, mode.is_single_producer(), mode.is_single_consumer())
    }

    pub(crate) fn with_modes(capacity: u32, sp_mode: bool, sc_mode: bool) -> Result<Self> {
        if capacity < MIN_QUEUE_CAPACITY || !capacity.is_power_of_two() {
            return Err(SurgeError::InvalidCapacity { capacity });
        }
        if !sp_mode && !dcas16_supported() {
            return Err(SurgeError::UnsupportedCpu);
        }

        let buffer = (0..capacity)
            .map(|_| Slot::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let mask = u64::from(capacity - 1);

        Ok(Self {
            capacity,
            mask,
            seq_mask: !mask,
            sp_mode,
            sc_mode,
            closed: AtomicBool::new(false),
            buffer,
            head: PaddedCursor::new(u64::from(capacity)),
            tail: PaddedCursor::new(0),
        })
    }

    /// Queue capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Concurrency mode the queue was created with.
    pub fn mode(&self) -> QueueMode {
        QueueMode::from_modes(self.sp_mode, self.sc_mode)
    }

    /// Approximate number of queued items.
    ///
    /// Racy by nature: the cursors move independently, and in multi-producer
    /// mode the shared tail may lag the true logical tail.
    pub fn len(&self) -> u32 {
        let tail = self.tail.seq.load(Ordering::Relaxed);
        let head = self.head.seq.load(Ordering::Relaxed);
        let occupancy = Self::xcmp(tail, head.wrapping_sub(u64::from(self.capacity)));
        occupancy.clamp(0, i64::from(self.capacity)) as u32
    }

    /// Approximate emptiness check; racy like [`len`](RingCore::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether [`close`](RingCore::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    fn seq2ndx(&self, seq: u64) -> usize {
        (seq & self.mask) as usize
    }

    #[inline]
    fn seq2node(&self, seq: u64) -> u64 {
        seq & self.seq_mask
    }

    /// Wrap-agnostic three-way comparison of sequence values.
    #[inline]
    fn xcmp(a: u64, b: u64) -> i64 {
        a.wrapping_sub(b) as i64
    }

    /// Attempt to insert `value` at the tail without blocking.
    ///
    /// # Errors
    ///
    /// [`SurgeError::Full`] when every slot holds an undequeued item,
    /// [`SurgeError::Closed`] once the queue has been closed.
    pub fn try_enqueue(&self, value: usize) -> Result<()> {
        let result = if self.sp_mode {
            self.enqueue_sp(value)
        } else {
            self.enqueue_mp(value)
        };
        if result == Err(SurgeError::Full) {
            stats::with(|s| s.queue_full_count += 1);
        }
        result
    }

    /// Attempt to remove the item at the head without blocking.
    ///
    /// # Errors
    ///
    /// [`SurgeError::Empty`] when no item is available,
    /// [`SurgeError::Closed`] when the queue is both closed and drained.
    /// Items enqueued before a close are always delivered before `Closed`
    /// is reported.
    pub fn try_dequeue(&self) -> Result<usize> {
        // Sample the flag before the attempt: a concurrent close between the
        // failed dequeue and the check would otherwise swallow items that
        // landed in that window.
        let was_closed = self.is_closed();

        let taken = if self.sc_mode {
            self.dequeue_sc()
        } else {
            self.dequeue_mc()
        };
        match taken {
            Some(value) => Ok(value),
            None if was_closed => Err(SurgeError::Closed),
            None => {
                stats::with(|s| s.queue_empty_count += 1);
                Err(SurgeError::Empty)
            }
        }
    }

    /// Close the queue.
    ///
    /// Sets the logical flag and plants the close bit in the next slot a
    /// producer would fill, so late enqueues fail structurally even if they
    /// race past the flag. Dequeues keep draining; they report
    /// [`SurgeError::Closed`] only once the queue is empty. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);

        if self.sp_mode {
            let tail_copy = self.tail.seq.load(Ordering::Relaxed);
            let ndx = self.seq2ndx(tail_copy);
            self.buffer[ndx].or_seq(Q_CLOSED, Ordering::Release);
        } else {
            // Re-run the enqueue locate logic, but mark instead of writing.
            // Err(Closed) here means another closer already planted the bit.
            let _ = self.update_node(false, |ndx, node_seq, old_value| {
                self.buffer[ndx].dcas(node_seq, old_value, node_seq | Q_CLOSED, old_value)
            });
        }
        tracing::debug!(capacity = self.capacity, "ring closed");
    }

    fn enqueue_sp(&self, value: usize) -> Result<()> {
        let tail_copy = self.tail.seq.load(Ordering::Acquire);
        let ndx = self.seq2ndx(tail_copy);
        let node = &self.buffer[ndx];

        let node_seq = node.seq(Ordering::Relaxed);
        if node_seq & Q_CLOSED != 0 {
            return Err(SurgeError::Closed);
        }
        if node_seq != self.seq2node(tail_copy) {
            return Err(SurgeError::Full);
        }

        // The slot looks writable for this generation, but when every slot
        // is occupied the oldest full slot carries the same sequence the
        // tail expects; the head settles the ambiguity.
        let head_copy = self.head.seq.load(Ordering::Relaxed);
        if node_seq.wrapping_add(ndx as u64) == head_copy {
            return Err(SurgeError::Full);
        }

        node.set_value(value as u64, Ordering::Relaxed);
        node.set_seq(node_seq.wrapping_add(u64::from(self.capacity)), Ordering::Release);
        self.tail.seq.store(tail_copy.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    fn enqueue_mp(&self, value: usize) -> Result<()> {
        self.update_node(true, |ndx, node_seq, old_value| {
            let advanced = node_seq.wrapping_add(u64::from(self.capacity));
            if self.buffer[ndx].dcas(node_seq, old_value, advanced, value as u64) {
                self.try_update_tail(node_seq.wrapping_add(ndx as u64).wrapping_add(1));
                true
            } else {
                stats::with(|s| s.producer_retries += 1);
                false
            }
        })
    }

    /// Locate the next writable slot and apply `apply` to it.
    ///
    /// Shared by multi-producer enqueue and close. `apply` receives the slot
    /// index, its observed sequence, and its observed value, and returns
    /// whether its pair compare-exchange took effect; a false return
    /// restarts the locate loop.
    ///
    /// The next empty slot is found from the shared tail, then by walking a
    /// local copy forward while the slots say other producers are already
    /// past it. Either the original tail or the previous slot's sequence was
    /// published by the last successful enqueue, which observed `head >
    /// tail`; the acquire fence before the head load makes that observation
    /// visible here, so a head at or behind the located slot can only mean
    /// the queue is full.
    fn update_node<F>(&self, test_full: bool, mut apply: F) -> Result<()>
    where
        F: FnMut(usize, u64, u64) -> bool,
    {
        loop {
            let mut tail_copy = self.tail.seq.load(Ordering::Relaxed);
            let mut ndx = self.seq2ndx(tail_copy);
            let mut node_seq = self.buffer[ndx].seq(Ordering::Relaxed);
            if node_seq & Q_CLOSED != 0 {
                return Err(SurgeError::Closed);
            }

            while Self::xcmp(node_seq.wrapping_add(ndx as u64), tail_copy) > 0 {
                let tail_latency = node_seq.wrapping_sub(self.seq2node(tail_copy));
                if tail_latency > u64::from(self.capacity) {
                    // The slot is more than one generation ahead: producers
                    // have lapped this view of the tail. Realign to the
                    // slot's generation instead of stepping slot by slot.
                    stats::with(|s| s.producer_wraps += 1);
                    tail_copy = node_seq
                        .wrapping_sub(u64::from(self.capacity))
                        .wrapping_add(ndx as u64);
                } else {
                    tail_copy = tail_copy.wrapping_add(1);
                }
                ndx = self.seq2ndx(tail_copy);
                node_seq = self.buffer[ndx].seq(Ordering::Relaxed);
                if node_seq & Q_CLOSED != 0 {
                    return Err(SurgeError::Closed);
                }
            }

            if Self::xcmp(node_seq, self.seq2node(tail_copy)) < 0 {
                // Slot lags the tail: another producer won the slot but has
                // not advanced the shared tail yet.
                tracing::warn!(node_seq, tail_copy, "slot sequence behind tail, retrying");
                continue;
            }

            if test_full {
                fence(Ordering::Acquire);
                let head_copy = self.head.seq.load(Ordering::Relaxed);
                let cc = Self::xcmp(node_seq.wrapping_add(ndx as u64), head_copy);
                if cc == 0 {
                    return Err(SurgeError::Full);
                }
                if cc > 0 {
                    // The head can never be behind a slot the tail has
                    // reached; seeing it means the ordering protocol broke.
                    stats::with(|s| s.invalid_head_sync += 1);
                    tracing::error!(
                        node_seq,
                        ndx,
                        head_copy,
                        "head observed behind tail; memory ordering violated"
                    );
                    std::process::abort();
                }
            }

            let old_value = self.buffer[ndx].value(Ordering::Relaxed);
            if apply(ndx, node_seq, old_value) {
                return Ok(());
            }
        }
    }

    /// Advance the shared tail to `new_tail` unless it is already there.
    ///
    /// Best-effort: losing the race means another producer pushed it at
    /// least as far.
    fn try_update_tail(&self, new_tail: u64) {
        let mut current = self.tail.seq.load(Ordering::Relaxed);
        loop {
            if Self::xcmp(current, new_tail) >= 0 {
                return;
            }
            match self.tail.seq.compare_exchange(
                current,
                new_tail,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    fn dequeue_sc(&self) -> Option<usize> {
        let head_copy = self.head.seq.load(Ordering::Acquire);
        let ndx = self.seq2ndx(head_copy);
        let node = &self.buffer[ndx];

        // The close flag may sit on a still-full slot; it only gates
        // producers, so strip it before comparing.
        let node_seq = node.seq(Ordering::Relaxed) & !Q_CLOSED;
        if node_seq != self.seq2node(head_copy) {
            return None; // empty
        }

        let value = node.value(Ordering::Acquire);
        self.head.seq.store(head_copy.wrapping_add(1), Ordering::Relaxed);
        Some(value as usize)
    }

    fn dequeue_mc(&self) -> Option<usize> {
        let mut head_copy = self.head.seq.load(Ordering::Relaxed);
        loop {
            let ndx = self.seq2ndx(head_copy);
            let node_seq = self.buffer[ndx].seq(Ordering::Acquire) & !Q_CLOSED;
            let cc = Self::xcmp(node_seq, self.seq2node(head_copy));
            if cc < 0 {
                return None; // empty
            }
            if cc > 0 {
                // Producers have cycled this slot a whole generation past
                // our head copy; reload and retry.
                stats::with(|s| s.consumer_wraps += 1);
                head_copy = self.head.seq.load(Ordering::Relaxed);
                continue;
            }

            // seq matches: read the payload, then claim it by advancing the
            // head. The slot sequence is left alone; the next producer at
            // this slot expects exactly the value it already holds.
            let value = self.buffer[ndx].value(Ordering::Acquire);
            match self.head.seq.compare_exchange_weak(
                head_copy,
                head_copy.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(value as usize),
                Err(observed) => {
                    stats::with(|s| s.consumer_retries += 1);
                    head_copy = observed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_capacities() {
        for capacity in [0, 1, 3, 6, 100] {
            let err = RingCore::new(capacity, QueueMode::Spsc).unwrap_err();
            assert_eq!(err, SurgeError::InvalidCapacity { capacity });
        }
    }

    #[test]
    fn test_spsc_smoke() {
        let ring = RingCore::new(8, QueueMode::Spsc).unwrap();
        ring.try_enqueue(42).unwrap();
        assert_eq!(ring.try_dequeue().unwrap(), 42);
        assert_eq!(ring.try_dequeue(), Err(SurgeError::Empty));
    }

    #[test]
    fn test_mpmc_smoke() {
        let ring = RingCore::new(8, QueueMode::Mpmc).unwrap();
        for v in 0..8 {
            ring.try_enqueue(v).unwrap();
        }
        assert_eq!(ring.try_enqueue(8), Err(SurgeError::Full));
        for v in 0..8 {
            assert_eq!(ring.try_dequeue().unwrap(), v);
        }
    }

    #[test]
    fn test_len_tracks_occupancy() {
        let ring = RingCore::new(4, QueueMode::Mpmc).unwrap();
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        ring.try_enqueue(1).unwrap();
        ring.try_enqueue(2).unwrap();
        assert_eq!(ring.len(), 2);
        ring.try_dequeue().unwrap();
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_generation_reuse_across_wraps() {
        let ring = RingCore::new(4, QueueMode::Mpmc).unwrap();
        for round in 0..10 {
            for i in 0..4 {
                ring.try_enqueue(round * 100 + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(ring.try_dequeue().unwrap(), round * 100 + i);
            }
        }
    }

    #[test]
    fn test_close_on_full_queue_still_drains() {
        for mode in [QueueMode::Spsc, QueueMode::Mpmc] {
            let ring = RingCore::new(4, mode).unwrap();
            for v in 0..4 {
                ring.try_enqueue(v).unwrap();
            }
            ring.close();
            assert_eq!(ring.try_enqueue(9), Err(SurgeError::Closed));
            for v in 0..4 {
                assert_eq!(ring.try_dequeue().unwrap(), v, "mode {mode:?}");
            }
            assert_eq!(ring.try_dequeue(), Err(SurgeError::Closed));
        }
    }

    #[test]
    fn test_mode_accessor() {
        let ring = RingCore::new(4, QueueMode::Mpsc).unwrap();
        assert_eq!(ring.mode(), QueueMode::Mpsc);
        assert_eq!(ring.capacity(), 4);
    }
}
