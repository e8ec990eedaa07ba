//! Lock-free bounded queue and its blocking wrappers.
//!
//! ## Layers
//!
//! | Type | Role |
//! |------|------|
//! | [`RingCore`] | Non-blocking bounded queue; per-slot sequence protocol |
//! | [`EventCount`] | Mutex-free wait/wake primitive over a futex |
//! | [`BlockingQueue`] | RingCore plus a configurable wait strategy |
//!
//! ## Concurrency modes
//!
//! The ring supports all four producer/consumer cardinalities. Single-side
//! modes switch to straight-line fast paths that skip the compare-exchange
//! loops; the declared mode is trusted by the implementation.
//!
//! ## Wait strategies
//!
//! | Strategy | Parking primitive | Trade-off |
//! |----------|-------------------|-----------|
//! | [`SyncType::EventCount`] | futex via [`EventCount`] | scalable default |
//! | [`SyncType::Mutex`] | per-side mutex + condvar | simple, low fan-in |
//! | [`SyncType::Yield`] | `thread::yield_now` | lowest latency, burns CPU |
//! | [`SyncType::Semaphore`] | counting semaphores | strict slot accounting |
//! | [`SyncType::Atomic32`] | futex on a generation word | lightweight wakeups |

mod blocking;
mod eventcount;
mod futex;
mod ring;
mod semaphore;
mod slot;

pub use blocking::BlockingQueue;
pub use eventcount::EventCount;
pub use ring::RingCore;

/// Producer/consumer cardinality of a queue.
///
/// Single-producer and single-consumer declarations are promises made by
/// the caller: the queue picks unsynchronized fast paths for the declared
/// single side, and breaking the promise is undefined behavior at the
/// queue-semantics level (lost or duplicated items).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Multi-producer, multi-consumer
    Mpmc,
    /// Multi-producer, single consumer
    Mpsc,
    /// Single producer, multi-consumer
    Spmc,
    /// Single producer, single consumer
    Spsc,
}

impl QueueMode {
    /// Whether enqueue may skip producer synchronization.
    pub fn is_single_producer(self) -> bool {
        matches!(self, Self::Spmc | Self::Spsc)
    }

    /// Whether dequeue may skip consumer synchronization.
    pub fn is_single_consumer(self) -> bool {
        matches!(self, Self::Mpsc | Self::Spsc)
    }

    pub(crate) fn from_modes(sp_mode: bool, sc_mode: bool) -> Self {
        match (sp_mode, sc_mode) {
            (false, false) => Self::Mpmc,
            (false, true) => Self::Mpsc,
            (true, false) => Self::Spmc,
            (true, true) => Self::Spsc,
        }
    }
}

/// Wait strategy for [`BlockingQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// Block on per-side event counts; the scalable default
    EventCount,
    /// Block on per-side mutex/condvar pairs; serializes blocked threads
    /// on each side
    Mutex,
    /// Spin with cooperative yields instead of sleeping
    Yield,
    /// Block on counting semaphores tracking free slots and queued items
    Semaphore,
    /// Block on a 32-bit generation word with futex wait/wake
    Atomic32,
}
