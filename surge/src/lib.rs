//! # surge
//!
//! Bounded lock-free MPMC ring queue for intra-process work distribution.
//!
//! The queue moves opaque machine-word payloads (pointer-or-integer values)
//! between producer and consumer threads. The core is strictly
//! non-blocking; a wrapper adds blocking enqueue/dequeue over a choice of
//! wait strategies.
//!
//! ## Quick start
//!
//! ```no_run
//! use surge::{BlockingQueue, QueueMode, SyncType};
//!
//! let queue = BlockingQueue::new(1024, QueueMode::Mpmc, SyncType::EventCount)?;
//! queue.enqueue(42)?;
//! assert_eq!(queue.dequeue()?, 42);
//! queue.close();
//! # Ok::<(), surge::SurgeError>(())
//! ```
//!
//! ## Guarantees
//!
//! - Lock-free core: under contention some operation always completes in a
//!   bounded number of steps (individual operations may be starved).
//! - Each enqueued value is dequeued exactly once; dequeue order is a
//!   prefix of the linearized enqueue order.
//! - Graceful close: producers fail fast, consumers drain every in-flight
//!   item before seeing [`SurgeError::Closed`].
//!
//! ## Platform
//!
//! x86-64 Linux only: multi-producer slots are updated with `lock
//! cmpxchg16b`, and blocking paths park on futexes.

#[cfg(not(all(target_arch = "x86_64", target_os = "linux")))]
compile_error!("surge requires x86_64 Linux: 16-byte compare-exchange and futex");

pub mod constants;
pub mod error;
pub mod queue;
pub mod stats;

pub use error::{Result, SurgeError};
pub use queue::{BlockingQueue, EventCount, QueueMode, RingCore, SyncType};
pub use stats::QueueStats;
