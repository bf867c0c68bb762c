/*!
 * Counting semaphores and the permit chain gating the three stages
 *
 * The chain starts with a single read permit. Each stage waits on its own
 * permit and signals the next one, so exactly one token circulates
 * Reader -> Classifier -> Writer -> Reader.
 */

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore with blocking wait
pub struct Semaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    // Counter updates are single statements, a poisoned guard is still consistent
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a permit is available, then take it
    pub fn wait(&self) {
        let mut count = self.lock();

        while *count == 0 {
            count = self
                .condvar
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *count -= 1;
    }

    /// Release one permit and wake one waiter
    pub fn signal(&self) {
        let mut count = self.lock();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Current number of available permits
    pub fn available(&self) -> usize {
        *self.lock()
    }
}

/// The three permits of the stage cycle
pub struct PermitChain {
    pub read: Semaphore,
    pub classify: Semaphore,
    pub write: Semaphore,
}

impl PermitChain {
    /// Reader holds the only token at start
    pub fn new() -> Self {
        Self {
            read: Semaphore::new(1),
            classify: Semaphore::new(0),
            write: Semaphore::new(0),
        }
    }

    /// Wake every stage regardless of whose turn it is.
    ///
    /// Only used on abort: afterwards the counters no longer describe a
    /// single token, so every stage must check the abort flag right after
    /// its wait returns.
    pub fn release_all(&self) {
        self.read.signal();
        self.classify.signal();
        self.write.signal();
    }

    /// Total permits outstanding across the chain
    pub fn outstanding(&self) -> usize {
        self.read.available() + self.classify.available() + self.write.available()
    }
}

impl Default for PermitChain {
    fn default() -> Self {
        Self::new()
    }
}
