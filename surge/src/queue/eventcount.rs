//! Event count: a condition-variable-like primitive with no mutex.
//!
//! The whole state is one 64-bit word. The low 32 bits are the generation
//! counter the kernel futex blocks on (odd while open, zero once closed);
//! the high 32 bits count waiters that have registered with [`mark`] and not
//! yet observed a generation change.
//!
//! Bundling both halves in one word is what makes `post` race-free: it
//! clears the waiter count in the same compare-exchange that bumps the
//! generation. A concurrent `mark` either lands before that update (its
//! waiter is included and gets woken) or after (it reads the new generation
//! and its `wait` returns without blocking).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::constants::{FUTEX_INCR, WAITER_INCR};
use crate::queue::futex::{self, WaitOutcome};

/// Generation counter with a built-in waiter census.
///
/// The wait protocol is check-mark-check: try the guarded operation, `mark`,
/// try again, and only then `wait` with the mark. Any progress signalled by
/// `post` between the mark and the wait bumps the generation, so the wait
/// returns immediately instead of sleeping through the wakeup.
pub struct EventCount {
    state: AtomicU64,
}

impl EventCount {
    /// Create an open event count (generation 1, no waiters).
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(1),
        }
    }

    // The futex word is the low half of the state; on little-endian that is
    // the first four bytes of the AtomicU64.
    #[inline]
    fn futex_word(&self) -> *const u32 {
        self.state.as_ptr() as *const u32
    }

    /// Register intent to wait and return the current generation.
    ///
    /// A mark of zero means the event count is closed; `wait` treats it as
    /// an instruction to return immediately.
    pub fn mark(&self) -> u32 {
        self.state.fetch_add(WAITER_INCR, Ordering::Acquire) as u32
    }

    /// Block until the generation moves past `mark`.
    pub fn wait(&self, mark: u32) {
        self.wait_timeout(mark, None);
    }

    /// Block until the generation moves past `mark` or `timeout` expires.
    ///
    /// `None` waits forever. Spurious returns are possible; callers sit in a
    /// retry loop around the guarded operation anyway.
    pub fn wait_timeout(&self, mark: u32, timeout: Option<Duration>) {
        if mark == 0 {
            return;
        }
        loop {
            let current = self.state.load(Ordering::Acquire) as u32;
            if current != mark {
                return;
            }
            match futex::wait(self.futex_word(), current, timeout) {
                WaitOutcome::Woken | WaitOutcome::TimedOut => return,
                WaitOutcome::Mismatch | WaitOutcome::Interrupted => {}
            }
        }
    }

    /// Roll back a `mark` that is no longer needed.
    ///
    /// Best-effort: if the generation has already moved (or the waiter count
    /// was cleared by a post) there is nothing to undo. The cost of a missed
    /// reset is a phantom waiter the next `post` clears anyway.
    pub fn reset(&self, mark: u32) {
        if mark == 0 {
            return;
        }
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current as u32 != mark || current >> 32 == 0 {
                return;
            }
            match self.state.compare_exchange_weak(
                current,
                current - WAITER_INCR,
                Ordering::Relaxed,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Advance the generation and wake all waiters, if there are any.
    ///
    /// No-op when the event count is closed or nobody is waiting.
    pub fn post(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let generation = current as u32;
            if generation == 0 {
                return; // closed
            }
            if current >> 32 == 0 {
                return; // no waiters
            }
            let bumped = u64::from(generation.wrapping_add(FUTEX_INCR));
            match self.state.compare_exchange_weak(
                current,
                bumped,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        futex::wake_all(self.futex_word());
    }

    /// Close the event count: current and future waits no longer block.
    pub fn close(&self) {
        self.state.store(0, Ordering::Release);
        futex::wake_all(self.futex_word());
    }

    /// Check whether the event count has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) as u32 == 0
    }
}

impl Default for EventCount {
    fn default() -> Self {
        Self::new()
    }
}
