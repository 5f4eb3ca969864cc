//! Handoff signal between the producer and the worker thread.
//!
//! `Semaphore` is a counting release/acquire primitive: every `release` adds one
//! permit, every `acquire` blocks until a permit is available and takes it. The
//! count lives under its own mutex, separate from the frame queue's lock, so a
//! waiter never holds the queue lock while parked.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            permits: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Add one permit and wake one waiter.
    pub fn release(&self) {
        let mut permits = self.lock();
        *permits += 1;
        // Notify while holding the lock so the wakeup cannot slip between a
        // waiter's check and its wait.
        self.available.notify_one();
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.lock();
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    /// Current permit count (diagnostics only; stale as soon as it returns).
    pub fn permits(&self) -> usize {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // A counter cannot be left half-updated, so a poisoned lock is still usable.
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn permits_are_counted() {
        let sem = Semaphore::new(0);
        sem.release();
        sem.release();
        assert_eq!(sem.permits(), 2);

        sem.acquire();
        sem.acquire();
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            std::thread::spawn(move || {
                sem.acquire();
            })
        };

        std::thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished(), "acquire must block with no permits");

        sem.release();
        waiter.join().expect("waiter thread");
        assert_eq!(sem.permits(), 0);
    }
}
