//! # Mutex
//!
//! Async mutual exclusion built on a one-permit [`Semaphore`]. It guards a
//! critical section rather than a value, which suits serializing calls to a
//! resource that lives elsewhere (a file, a connection, an upstream API).
//!
//! Waiters are served in arrival order. The lock is not reentrant.

use super::semaphore::{Semaphore, SemaphorePermit};
use std::future::Future;

#[derive(Debug)]
pub struct Mutex {
    semaphore: Semaphore,
}

impl Mutex {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(1),
        }
    }

    /// Wait until the lock is free and take it
    pub async fn acquire(&self) -> MutexGuard<'_> {
        MutexGuard {
            permit: self.semaphore.acquire().await,
        }
    }

    pub fn try_acquire(&self) -> Option<MutexGuard<'_>> {
        self.semaphore
            .try_acquire()
            .map(|permit| MutexGuard { permit })
    }

    /// Unlock a lock detached with [`MutexGuard::forget`]. Unlocking a free
    /// mutex has no effect.
    pub fn release(&self) {
        self.semaphore.release();
    }

    /// Run `operation` with the lock held; the lock is released however
    /// `operation` finishes.
    pub async fn with_lock<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.semaphore.with_permit(operation).await
    }

    pub fn is_locked(&self) -> bool {
        self.semaphore.available() == 0
    }

    pub fn waiting_count(&self) -> usize {
        self.semaphore.waiting_count()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Held lock, released on drop
#[must_use = "dropping the guard unlocks the mutex immediately"]
#[derive(Debug)]
pub struct MutexGuard<'a> {
    permit: SemaphorePermit<'a>,
}

impl MutexGuard<'_> {
    /// Keep the mutex locked after the guard goes away. Pair with
    /// [`Mutex::release`].
    pub fn forget(self) {
        self.permit.forget();
    }
}
