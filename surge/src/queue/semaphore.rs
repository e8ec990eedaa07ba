//! Counting semaphore built on a parking_lot mutex and condvar.
//!
//! Backs the semaphore wait strategy of the blocking queue: `empty_nodes`
//! starts at the queue capacity, `full_nodes` at zero, and each transfer
//! moves one permit from one side to the other.

use parking_lot::{Condvar, Mutex};

pub(crate) struct Semaphore {
    permits: Mutex<u64>,
    available: Condvar,
}

impl Semaphore {
    pub(crate) fn new(permits: u64) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Take one permit without blocking.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Take one permit, blocking until one is available.
    pub(crate) fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Return `count` permits.
    pub(crate) fn release(&self, count: u64) {
        let mut permits = self.permits.lock();
        *permits += count;
        drop(permits);
        if count == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_counts_down() {
        let sem = Semaphore::new(2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release(1);
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_release_unblocks_acquire() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        let waiter = std::thread::spawn(move || sem2.acquire());
        std::thread::sleep(Duration::from_millis(20));
        sem.release(1);
        waiter.join().unwrap();
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_bulk_release_unblocks_many() {
        let sem = Arc::new(Semaphore::new(0));
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let sem = sem.clone();
                std::thread::spawn(move || sem.acquire())
            })
            .collect();
        std::thread::sleep(Duration::from_millis(20));
        sem.release(4);
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
