//! Mutex and condition pair.
//!
//! [`Lock`] is the blocking primitive of the library. The lock-free
//! containers never wait on it; the emulated compare-and-swap backend holds
//! one for the duration of a single compare-and-write, and callers that need
//! a bounded wait for data (e.g. a consumer polling a queue) can park on
//! [`Lock::wait_timeout`] until a producer calls [`Lock::signal`].

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// A mutex with a built-in signal flag.
///
/// `signal` wakes one waiter; a signal sent while nobody waits is remembered
/// and consumed by the next `wait`.
#[derive(Default)]
pub struct Lock {
    signalled: Mutex<bool>,
    condition: Condvar,
}

/// Scoped ownership of a [`Lock`]; released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    _guard: MutexGuard<'a, bool>,
}

impl Lock {
    /// Creates an unlocked, unsignalled lock.
    pub const fn new() -> Self {
        Self {
            signalled: parking_lot::const_mutex(false),
            condition: Condvar::new(),
        }
    }

    /// Blocks until the lock is obtained.
    pub fn lock(&self) -> LockGuard<'_> {
        LockGuard {
            _guard: self.signalled.lock(),
        }
    }

    /// Obtains the lock if it is free, without blocking.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        self.signalled
            .try_lock()
            .map(|guard| LockGuard { _guard: guard })
    }

    /// Blocks until [`signal`](Self::signal) is called, consuming the signal.
    pub fn wait(&self) {
        let mut signalled = self.signalled.lock();
        while !*signalled {
            self.condition.wait(&mut signalled);
        }
        *signalled = false;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `true` if a signal was consumed, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signalled = self.signalled.lock();
        while !*signalled {
            if self
                .condition
                .wait_until(&mut signalled, deadline)
                .timed_out()
            {
                break;
            }
        }
        let consumed = *signalled;
        *signalled = false;
        consumed
    }

    /// Wakes one waiter, or leaves the signal pending if nobody waits.
    pub fn signal(&self) {
        let mut signalled = self.signalled.lock();
        *signalled = true;
        self.condition.notify_one();
    }
}

impl core::fmt::Debug for Lock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Lock")
            .field("locked", &self.signalled.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_lock_fails_while_held() {
        let lock = Lock::new();
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn pending_signal_is_consumed_once() {
        let lock = Lock::new();
        lock.signal();
        assert!(lock.wait_timeout(Duration::from_millis(1)));
        assert!(!lock.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn signal_wakes_waiter() {
        let lock = Arc::new(Lock::new());
        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.wait_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        lock.signal();
        assert!(waiter.join().unwrap());
    }
}
