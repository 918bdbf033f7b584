//! # Semaphore
//!
//! Counting semaphore with a strict FIFO waiter queue.
//!
//! `acquire()` resolves immediately while permits are free. Otherwise the caller
//! joins the back of the queue and is resumed only when a released permit is
//! handed to it directly, so a late arrival can never overtake an earlier waiter.
//!
//! Permits are RAII guards: dropping a [`SemaphorePermit`] releases it, which is
//! what makes [`Semaphore::with_permit`] release on every exit path (normal
//! return, `Err`, panic unwind and cancellation of the enclosing future).
//!
//! The semaphore is not reentrant. A task that already holds every permit and
//! calls `acquire()` again waits on itself forever.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

#[derive(Debug)]
struct SemaphoreState {
    available: usize,
    /// Suspended callers in arrival order. A closed sender belongs to a caller
    /// that stopped waiting and is skipped on release.
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Counting semaphore with FIFO hand-off of released permits
#[derive(Debug)]
pub struct Semaphore {
    max_permits: usize,
    state: Mutex<SemaphoreState>,
}

impl Semaphore {
    /// Create a semaphore with `max_permits` permits, all initially available.
    ///
    /// # Panics
    ///
    /// Panics if `max_permits` is zero.
    pub fn new(max_permits: usize) -> Self {
        assert!(max_permits > 0, "semaphore requires at least one permit");

        Self {
            max_permits,
            state: Mutex::new(SemaphoreState {
                available: max_permits,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Wait for a permit.
    ///
    /// Dropping the returned future before it resolves removes the caller from
    /// the queue. If a permit was handed over in the meantime it is passed on
    /// to the next waiter instead of being lost.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        loop {
            let receiver = {
                let mut state = self.state.lock();
                if state.available > 0 {
                    state.available -= 1;
                    return SemaphorePermit { semaphore: self };
                }
                let (sender, receiver) = oneshot::channel();
                state.waiters.push_back(sender);
                receiver
            };

            let mut pending = PendingAcquire {
                semaphore: self,
                receiver: Some(receiver),
            };
            if pending.wait().await {
                return SemaphorePermit { semaphore: self };
            }
        }
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut state = self.state.lock();
        if state.available > 0 {
            state.available -= 1;
            Some(SemaphorePermit { semaphore: self })
        } else {
            None
        }
    }

    /// Return one permit.
    ///
    /// The permit goes straight to the longest-waiting caller if there is one,
    /// otherwise it becomes available. Releasing when every permit is already
    /// available is ignored, so the count never exceeds `max_permits`.
    ///
    /// Only call this for permits detached with [`SemaphorePermit::forget`];
    /// guards release themselves on drop.
    pub fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }

        if state.available >= self.max_permits {
            drop(state);
            warn!(
                max_permits = self.max_permits,
                "Semaphore release ignored: all permits are already available"
            );
            return;
        }
        state.available += 1;
    }

    /// Run `operation` while holding a permit.
    pub async fn with_permit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        operation().await
    }

    /// Number of permits free right now
    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Number of callers suspended in `acquire()`
    pub fn waiting_count(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }
}

/// A held semaphore permit, returned to the semaphore on drop
#[must_use = "dropping the permit releases it immediately"]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Detach the permit without releasing it. The holder becomes responsible
    /// for a matching [`Semaphore::release`] call.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// A queued `acquire()` call. Dropping it mid-wait leaves the queue cleanly.
struct PendingAcquire<'a> {
    semaphore: &'a Semaphore,
    receiver: Option<oneshot::Receiver<()>>,
}

impl PendingAcquire<'_> {
    async fn wait(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        let granted = receiver.await.is_ok();
        if granted {
            self.receiver = None;
        }
        granted
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            // Granted after the caller gave up: hand it to the next in line.
            if receiver.try_recv().is_ok() {
                self.semaphore.release();
            }
        }
    }
}
