//! Mutex-free condition variables built on the progressive-backoff wait.
//!
//! Both types synchronize a real-time consumer with notifying threads
//! without any lock: `notify` is a single sequentially-consistent atomic
//! store or increment, and `wait` spins on the signal through
//! [`progressive_backoff_wait`](crate::backoff::progressive_backoff_wait).
//! They are not a replacement for `std::sync::Condvar` where complex
//! mutex-coupled waiting patterns are needed.
//!
//! The two variants differ only in how unconsumed notifications combine:
//!
//! - [`SpinCondvar`] keeps a boolean flag. Any number of notifies with no
//!   intervening wait collapse into one.
//! - [`CountingSpinCondvar`] keeps a counter. Every notify is consumed by
//!   exactly one wait.

use crate::backoff::progressive_backoff_wait;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// A mutex-free condition variable carrying a single boolean signal.
///
/// `notify` sets the flag; a waiter consumes it with an atomic
/// compare-and-set, so a signal wakes exactly one waiter even under
/// contention. Repeated notifies without an intervening wait coalesce:
/// after any positive number of them, exactly one subsequent [`wait`]
/// completes without further notification.
///
/// Because `notify` commits its store with sequentially-consistent ordering
/// before returning, a `wait` that starts after a `notify` completed (and
/// that is not raced by another waiter) is guaranteed to observe and consume
/// the signal — there are no lost wakeups and no spurious ones.
///
/// [`wait`]: SpinCondvar::wait
#[derive(Debug, Default)]
pub struct SpinCondvar {
    flag: AtomicBool,
}

impl SpinCondvar {
    /// Creates an unsignaled condition variable.
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Signals the condition. Wait-free and non-blocking.
    #[inline]
    pub fn notify(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    fn consume(&self) -> bool {
        self.flag
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Blocks until the internal signal is observed, and consumes it.
    pub fn wait(&self) {
        progressive_backoff_wait(|| self.consume());
    }

    /// Blocks until `pred` returns true.
    ///
    /// This form does not touch the internal signal; it is a plain
    /// progressive-backoff wait on the caller's own condition, kept here so
    /// call sites can stay on one synchronization object.
    pub fn wait_pred<P: FnMut() -> bool>(&self, pred: P) {
        progressive_backoff_wait(pred);
    }

    /// Like [`wait`](SpinCondvar::wait), but gives up once `timeout` has
    /// elapsed. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Like [`wait`](SpinCondvar::wait), but gives up at `deadline`.
    /// Returns `false` if the deadline was reached without the signal.
    ///
    /// The deadline is checked from inside the backoff predicate, so the
    /// timeout is observed with the granularity of the current backoff
    /// phase's delay.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut timed_out = false;
        progressive_backoff_wait(|| {
            if Instant::now() >= deadline {
                timed_out = true;
                return true;
            }
            self.consume()
        });
        !timed_out
    }

    /// Like [`wait_pred`](SpinCondvar::wait_pred) with a timeout. Returns
    /// `false` on timeout.
    pub fn wait_pred_for<P: FnMut() -> bool>(&self, pred: P, timeout: Duration) -> bool {
        self.wait_pred_until(pred, Instant::now() + timeout)
    }

    /// Like [`wait_pred`](SpinCondvar::wait_pred) with a deadline. Returns
    /// `false` if the deadline was reached before the predicate held.
    pub fn wait_pred_until<P: FnMut() -> bool>(&self, mut pred: P, deadline: Instant) -> bool {
        let mut timed_out = false;
        progressive_backoff_wait(|| {
            if Instant::now() >= deadline {
                timed_out = true;
                return true;
            }
            pred()
        });
        !timed_out
    }
}

/// A mutex-free condition variable carrying a notification counter.
///
/// `notify` increments a 32-bit counter; a waiter that observes a positive
/// value decrements it and returns. Unlike [`SpinCondvar`], notifications do
/// not coalesce: after `k` notifies with no intervening waits, exactly `k`
/// subsequent [`wait`] calls complete without further notification.
///
/// The predicate forms deliberately leave the counter untouched — they wait
/// on the caller's condition only, mirroring [`SpinCondvar::wait_pred`].
///
/// [`wait`]: CountingSpinCondvar::wait
#[derive(Debug, Default)]
pub struct CountingSpinCondvar {
    count: AtomicU32,
}

impl CountingSpinCondvar {
    /// Creates a condition variable with no pending notifications.
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Signals the condition, queueing one wakeup. Wait-free, non-blocking.
    #[inline]
    pub fn notify(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    fn consume(&self) -> bool {
        // One attempt per predicate call; the backoff supplies the retry.
        let c = self.count.load(Ordering::SeqCst);
        c > 0
            && self
                .count
                .compare_exchange(c, c - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    /// Blocks until a notification is available, and consumes it.
    pub fn wait(&self) {
        progressive_backoff_wait(|| self.consume());
    }

    /// Blocks until `pred` returns true, without consuming a notification.
    pub fn wait_pred<P: FnMut() -> bool>(&self, pred: P) {
        progressive_backoff_wait(pred);
    }

    /// Like [`wait`](CountingSpinCondvar::wait), but gives up once `timeout`
    /// has elapsed. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Like [`wait`](CountingSpinCondvar::wait), but gives up at `deadline`.
    /// Returns `false` if the deadline was reached without a notification.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut timed_out = false;
        progressive_backoff_wait(|| {
            if Instant::now() >= deadline {
                timed_out = true;
                return true;
            }
            self.consume()
        });
        !timed_out
    }

    /// Like [`wait_pred`](CountingSpinCondvar::wait_pred) with a timeout.
    /// Returns `false` on timeout.
    pub fn wait_pred_for<P: FnMut() -> bool>(&self, pred: P, timeout: Duration) -> bool {
        self.wait_pred_until(pred, Instant::now() + timeout)
    }

    /// Like [`wait_pred`](CountingSpinCondvar::wait_pred) with a deadline.
    /// Returns `false` if the deadline was reached before the predicate held.
    pub fn wait_pred_until<P: FnMut() -> bool>(&self, mut pred: P, deadline: Instant) -> bool {
        let mut timed_out = false;
        progressive_backoff_wait(|| {
            if Instant::now() >= deadline {
                timed_out = true;
                return true;
            }
            pred()
        });
        !timed_out
    }
}
