//! Thin wrappers over the Linux futex syscall.
//!
//! All waits and wakes use private futexes: the queue is an intra-process
//! structure and never shares waiter words across address spaces.

use std::ptr;
use std::time::Duration;

/// Why a futex wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// Woken by a waker (or the kernel decided to return early)
    Woken,
    /// The word no longer held the expected value when the wait started
    Mismatch,
    /// The relative timeout expired
    TimedOut,
    /// Interrupted by a signal
    Interrupted,
}

/// Block until `futex` changes away from `expected` or the timeout expires.
///
/// `timeout` is relative; `None` waits forever. Callers re-check their
/// condition on return regardless of the outcome.
pub(crate) fn wait(futex: *const u32, expected: u32, timeout: Option<Duration>) -> WaitOutcome {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: libc::c_long::from(d.subsec_nanos()),
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |t| t as *const libc::timespec);

    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        )
    };
    if rc == 0 {
        return WaitOutcome::Woken;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::EAGAIN) => WaitOutcome::Mismatch,
        Some(libc::ETIMEDOUT) => WaitOutcome::TimedOut,
        Some(libc::EINTR) => WaitOutcome::Interrupted,
        _ => WaitOutcome::Woken,
    }
}

/// Wake at most one thread blocked on `futex`.
pub(crate) fn wake_one(futex: *const u32) {
    wake(futex, 1);
}

/// Wake every thread blocked on `futex`.
pub(crate) fn wake_all(futex: *const u32) {
    wake(futex, i32::MAX);
}

fn wake(futex: *const u32, count: i32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            futex,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        );
    }
}
