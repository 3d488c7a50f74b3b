//! Countdown latch awaited by tests while the call-await layers decrement it.

use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// A countdown latch: initialized to the number of call closes to expect,
/// decremented once per observed close, awaitable until it reaches zero.
///
/// Decrements are lock-free and safe from any number of runtime threads.
/// Waiting is level-triggered: once the count hits zero, every current and
/// future [`wait`](Self::wait) returns immediately. The latch carries no
/// timeout of its own; wrap the wait in `tokio::time::timeout` when the
/// test wants one.
pub struct CallLatch {
    count: AtomicUsize,
    zero: Notify,
}

impl CallLatch {
    /// Create a latch expecting `count` closes. `0` is valid and starts
    /// exhausted.
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
            zero: Notify::new(),
        }
    }

    /// Number of closes still expected.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Record one call close.
    ///
    /// Saturates at zero: decrementing an exhausted latch is a no-op. The
    /// single invocation that reaches zero wakes all waiters.
    pub fn count_down(&self) {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::trace!(remaining = current - 1, "call latch counted down");
                    if current == 1 {
                        self.zero.notify_waiters();
                    }
                    return;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Wait until the count reaches zero.
    ///
    /// Returns immediately if it already has, and never blocks again for
    /// this latch once it does.
    pub async fn wait(&self) {
        while self.count.load(Ordering::Acquire) != 0 {
            let mut zero = pin!(self.zero.notified());
            // Register before re-checking the count: a decrement landing in
            // between would otherwise be missed and the waiter would hang.
            zero.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            zero.await;
        }
    }
}
