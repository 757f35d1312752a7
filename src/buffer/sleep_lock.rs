//! SleepLock - the long-held, blocking lock on a buffer's contents.
//!
//! Unlike a bucket lock, a sleep lock may be held for as long as a caller's
//! read-modify-write takes (including across physical I/O), and waiters
//! block on a condition variable instead of spinning.
//!
//! The lock is not scoped: [`SleepLock::acquire`] and
//! [`SleepLock::release`] are separate calls so that the cache can take the
//! lock in `acquire` and drop it in a later `release`.

use std::cell::UnsafeCell;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

/// A blocking, single-holder lock that remembers its holder.
///
/// # Thread Safety
/// - `holder`: `Mutex` — guards the locked state, held only briefly
/// - `cond`: `Condvar` — waiters park here until `release`
/// - `data`: `UnsafeCell` — accessed only by whoever logically owns the lock
pub struct SleepLock<T> {
    /// Thread that acquired the lock, or None if free.
    holder: Mutex<Option<ThreadId>>,
    cond: Condvar,
    name: &'static str,
    data: UnsafeCell<T>,
}

// Access to `data` is serialised by the lock protocol.
unsafe impl<T: Send> Sync for SleepLock<T> {}

impl<T> SleepLock<T> {
    pub fn new(data: T, name: &'static str) -> Self {
        Self {
            holder: Mutex::new(None),
            cond: Condvar::new(),
            name,
            data: UnsafeCell::new(data),
        }
    }

    /// Block until the lock is free, then take it for the calling thread.
    pub fn acquire(&self) {
        let mut holder = self.holder.lock();
        while holder.is_some() {
            self.cond.wait(&mut holder);
        }
        *holder = Some(thread::current().id());
    }

    /// Release the lock and wake one waiter.
    ///
    /// Does not check the holder: the caller is responsible for only
    /// releasing a lock it owns.
    pub fn release(&self) {
        let mut holder = self.holder.lock();
        *holder = None;
        drop(holder);
        self.cond.notify_one();
    }

    /// Is the lock held by the calling thread?
    pub fn holding(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }

    /// Is the lock held by anyone?
    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw pointer to the protected data.
    ///
    /// Dereferencing it is only sound while the caller logically owns the
    /// lock (has acquired it and not yet released it).
    #[inline]
    pub fn data_ptr(&self) -> *mut T {
        self.data.get()
    }
}
