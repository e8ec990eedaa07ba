//! Blocking queue: the lock-free ring plus a configurable wait strategy.
//!
//! `enqueue` and `dequeue` loop over the non-blocking ring operations and
//! suspend the calling thread when the queue is full (producers) or empty
//! (consumers). The strategy only decides how a thread parks and wakes; all
//! queue semantics live in [`RingCore`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SurgeError};
use crate::queue::eventcount::EventCount;
use crate::queue::futex;
use crate::queue::ring::RingCore;
use crate::queue::semaphore::Semaphore;
use crate::queue::{QueueMode, SyncType};
use crate::stats;

/// Bounded blocking queue over machine-word payloads.
///
/// Producers block while the queue is full, consumers while it is empty.
/// [`close`](BlockingQueue::close) releases every waiter on both sides;
/// after it, `enqueue` returns [`SurgeError::Closed`] and `dequeue` drains
/// the remaining items before doing the same.
pub struct BlockingQueue {
    ring: RingCore,
    sync: SyncType,

    /// Posted by producers after progress; consumers wait on it.
    producer_ec: EventCount,
    /// Posted by consumers after progress; producers wait on it.
    consumer_ec: EventCount,

    // Mutex strategy state. The mutexes are per-side, so at most one
    // producer and one consumer block at a time; fine for low fan-in,
    // deliberately not a high-concurrency strategy.
    producer_mutex: Mutex<()>,
    producer_cvar: Condvar,
    consumer_mutex: Mutex<()>,
    consumer_cvar: Condvar,

    // Atomic32 strategy state: per-side generation words, futex-waited.
    producer_word: AtomicU32,
    consumer_word: AtomicU32,

    // Semaphore strategy state: permits for free slots and queued items.
    empty_nodes: Semaphore,
    full_nodes: Semaphore,
}

impl BlockingQueue {
    /// Create a blocking queue.
    ///
    /// See [`RingCore::new`] for capacity and mode requirements.
    pub fn new(capacity: u32, mode: QueueMode, sync: SyncType) -> Result<Self> {
        let ring = RingCore::new(capacity, mode)?;
        Ok(Self {
            ring,
            sync,
            producer_ec: EventCount::new(),
            consumer_ec: EventCount::new(),
            producer_mutex: Mutex::new(()),
            producer_cvar: Condvar::new(),
            consumer_mutex: Mutex::new(()),
            consumer_cvar: Condvar::new(),
            producer_word: AtomicU32::new(0),
            consumer_word: AtomicU32::new(0),
            empty_nodes: Semaphore::new(u64::from(capacity)),
            full_nodes: Semaphore::new(0),
        })
    }

    /// Queue capacity.
    pub fn capacity(&self) -> u32 {
        self.ring.capacity()
    }

    /// Concurrency mode of the underlying ring.
    pub fn mode(&self) -> QueueMode {
        self.ring.mode()
    }

    /// Wait strategy selected at construction.
    pub fn sync(&self) -> SyncType {
        self.sync
    }

    /// Approximate number of queued items; see [`RingCore::len`].
    pub fn len(&self) -> u32 {
        self.ring.len()
    }

    /// Approximate emptiness check.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Check whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.ring.is_closed()
    }

    /// Non-blocking enqueue; see [`RingCore::try_enqueue`].
    pub fn try_enqueue(&self, value: usize) -> Result<()> {
        self.ring.try_enqueue(value)
    }

    /// Non-blocking dequeue; see [`RingCore::try_dequeue`].
    pub fn try_dequeue(&self) -> Result<usize> {
        self.ring.try_dequeue()
    }

    /// Insert `value`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Only [`SurgeError::Closed`].
    pub fn enqueue(&self, value: usize) -> Result<()> {
        match self.sync {
            SyncType::EventCount => self.enqueue_ec(value),
            SyncType::Mutex => self.enqueue_mx(value),
            SyncType::Yield => self.enqueue_yield(value),
            SyncType::Semaphore => self.enqueue_sem(value),
            SyncType::Atomic32 => self.enqueue_a32(value),
        }
    }

    /// Remove the head item, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Only [`SurgeError::Closed`], and only after the queue has drained.
    pub fn dequeue(&self) -> Result<usize> {
        match self.sync {
            SyncType::EventCount => self.dequeue_ec(),
            SyncType::Mutex => self.dequeue_mx(),
            SyncType::Yield => self.dequeue_yield(),
            SyncType::Semaphore => self.dequeue_sem(),
            SyncType::Atomic32 => self.dequeue_a32(),
        }
    }

    /// Close the queue and release every blocked producer and consumer.
    pub fn close(&self) {
        // Close the ring first so every released waiter re-tests against a
        // closed queue, whatever strategy it parked under.
        self.ring.close();

        self.producer_ec.close();
        self.consumer_ec.close();

        // Taking and dropping each side's mutex pins any thread sitting
        // between a failed try-op and its condvar wait; without that, a
        // notify issued inside that window is lost and the waiter sleeps
        // through the close.
        drop(self.producer_mutex.lock());
        self.producer_cvar.notify_all();
        drop(self.consumer_mutex.lock());
        self.consumer_cvar.notify_all();

        // Release so a thread that re-samples the word also observes the
        // closed ring.
        self.producer_word.fetch_add(1, Ordering::Release);
        futex::wake_all(self.producer_word.as_ptr());
        self.consumer_word.fetch_add(1, Ordering::Release);
        futex::wake_all(self.consumer_word.as_ptr());

        // Enough permits to pass any plausible number of blocked threads.
        // Semaphore-mode waiters woken this way re-test the try-op and see
        // Closed.
        let flood = u64::from(i32::MAX as u32 - self.ring.capacity());
        self.empty_nodes.release(flood);
        self.full_nodes.release(flood);
    }

    // Event-count strategy: check-mark-check. Mark before the re-check so a
    // consumer's post either lands before the second try (which then
    // succeeds) or after the mark (so the wait sees a bumped generation and
    // returns instead of sleeping through the wakeup).
    fn enqueue_ec(&self, value: usize) -> Result<()> {
        loop {
            match self.ring.try_enqueue(value) {
                Ok(()) => {
                    self.producer_ec.post();
                    return Ok(());
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {}
            }

            let mark = self.consumer_ec.mark();
            match self.ring.try_enqueue(value) {
                Ok(()) => {
                    self.consumer_ec.reset(mark);
                    self.producer_ec.post();
                    return Ok(());
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {}
            }

            stats::with(|s| s.producer_waits += 1);
            self.consumer_ec.wait(mark);
        }
    }

    fn dequeue_ec(&self) -> Result<usize> {
        loop {
            match self.ring.try_dequeue() {
                Ok(value) => {
                    self.consumer_ec.post();
                    return Ok(value);
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {}
            }

            let mark = self.producer_ec.mark();
            match self.ring.try_dequeue() {
                Ok(value) => {
                    self.producer_ec.reset(mark);
                    self.consumer_ec.post();
                    return Ok(value);
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {}
            }

            stats::with(|s| s.consumer_waits += 1);
            self.producer_ec.wait(mark);
        }
    }

    fn enqueue_mx(&self, value: usize) -> Result<()> {
        let mut guard = self.producer_mutex.lock();
        loop {
            match self.ring.try_enqueue(value) {
                Ok(()) => {
                    drop(guard);
                    // Bracket the notify with the consumer mutex so it
                    // cannot fall between a consumer's failed dequeue and
                    // its wait. The own-side lock is already released, so
                    // the two mutexes are never held together.
                    drop(self.consumer_mutex.lock());
                    self.consumer_cvar.notify_one();
                    return Ok(());
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.producer_waits += 1);
                    self.producer_cvar.wait(&mut guard);
                }
            }
        }
    }

    fn dequeue_mx(&self) -> Result<usize> {
        let mut guard = self.consumer_mutex.lock();
        loop {
            match self.ring.try_dequeue() {
                Ok(value) => {
                    drop(guard);
                    drop(self.producer_mutex.lock());
                    self.producer_cvar.notify_one();
                    return Ok(value);
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.consumer_waits += 1);
                    self.consumer_cvar.wait(&mut guard);
                }
            }
        }
    }

    fn enqueue_yield(&self, value: usize) -> Result<()> {
        loop {
            match self.ring.try_enqueue(value) {
                Ok(()) => return Ok(()),
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.producer_waits += 1);
                    thread::yield_now();
                }
            }
        }
    }

    fn dequeue_yield(&self) -> Result<usize> {
        loop {
            match self.ring.try_dequeue() {
                Ok(value) => return Ok(value),
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.consumer_waits += 1);
                    thread::yield_now();
                }
            }
        }
    }

    // Semaphore strategy: a permit from empty_nodes guarantees a writable
    // slot, so the try-op failing with Full would mean the permit accounting
    // is broken.
    fn enqueue_sem(&self, value: usize) -> Result<()> {
        if !self.empty_nodes.try_acquire() {
            stats::with(|s| s.producer_waits += 1);
            self.empty_nodes.acquire();
        }
        match self.ring.try_enqueue(value) {
            Ok(()) => {
                self.full_nodes.release(1);
                Ok(())
            }
            Err(SurgeError::Closed) => Err(SurgeError::Closed),
            Err(_) => {
                tracing::error!("semaphore permit held but enqueue reported full");
                std::process::abort();
            }
        }
    }

    fn dequeue_sem(&self) -> Result<usize> {
        if !self.full_nodes.try_acquire() {
            stats::with(|s| s.consumer_waits += 1);
            self.full_nodes.acquire();
        }
        match self.ring.try_dequeue() {
            Ok(value) => {
                self.empty_nodes.release(1);
                Ok(value)
            }
            Err(SurgeError::Closed) => Err(SurgeError::Closed),
            Err(_) => {
                tracing::error!("semaphore permit held but dequeue reported empty");
                std::process::abort();
            }
        }
    }

    // Atomic32 strategy: sample the other side's generation word before the
    // try-op; a wake between the sample and the wait changes the word, so
    // the futex wait refuses to block on the stale value.
    fn enqueue_a32(&self, value: usize) -> Result<()> {
        loop {
            let mark = self.consumer_word.load(Ordering::Acquire);
            match self.ring.try_enqueue(value) {
                Ok(()) => {
                    self.producer_word.fetch_add(1, Ordering::Relaxed);
                    futex::wake_one(self.producer_word.as_ptr());
                    return Ok(());
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.producer_waits += 1);
                    futex::wait(self.consumer_word.as_ptr(), mark, None);
                }
            }
        }
    }

    fn dequeue_a32(&self) -> Result<usize> {
        loop {
            let mark = self.producer_word.load(Ordering::Acquire);
            match self.ring.try_dequeue() {
                Ok(value) => {
                    self.consumer_word.fetch_add(1, Ordering::Relaxed);
                    futex::wake_one(self.consumer_word.as_ptr());
                    return Ok(value);
                }
                Err(SurgeError::Closed) => return Err(SurgeError::Closed),
                Err(_) => {
                    stats::with(|s| s.consumer_waits += 1);
                    futex::wait(self.producer_word.as_ptr(), mark, None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_enqueue_dequeue_round_trip() {
        let queue = BlockingQueue::new(8, QueueMode::Mpmc, SyncType::EventCount).unwrap();
        queue.enqueue(11).unwrap();
        queue.enqueue(22).unwrap();
        assert_eq!(queue.dequeue().unwrap(), 11);
        assert_eq!(queue.dequeue().unwrap(), 22);
    }

    #[test]
    fn test_close_releases_blocked_consumer() {
        let queue =
            Arc::new(BlockingQueue::new(8, QueueMode::Mpmc, SyncType::EventCount).unwrap());
        let queue2 = queue.clone();
        let consumer = std::thread::spawn(move || queue2.dequeue());

        std::thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap(), Err(SurgeError::Closed));
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let queue = Arc::new(BlockingQueue::new(2, QueueMode::Mpmc, SyncType::EventCount).unwrap());
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();

        let queue2 = queue.clone();
        let producer = std::thread::spawn(move || queue2.enqueue(3));

        std::thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(producer.join().unwrap(), Err(SurgeError::Closed));
    }

    #[test]
    fn test_accessors() {
        let queue = BlockingQueue::new(16, QueueMode::Spsc, SyncType::Yield).unwrap();
        assert_eq!(queue.capacity(), 16);
        assert_eq!(queue.mode(), QueueMode::Spsc);
        assert_eq!(queue.sync(), SyncType::Yield);
        assert!(queue.is_empty());
        assert!(!queue.is_closed());
    }
}
