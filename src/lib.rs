//! Sakin: low-latency spin-wait and deferred-reclamation primitives for
//! real-time threads.
//!
//! Sakin is a small concurrency toolkit for threads that must never enter
//! the kernel scheduler on their fast path — audio callbacks, control loops,
//! market-data consumers. It provides three tightly-coupled primitives:
//!
//! - **Progressive-backoff wait** ([`progressive_backoff_wait`] and
//!   friends): a predicate-driven busy-wait that escalates from tight
//!   polling through CPU hint bursts and timed sleeps to OS yield.
//! - **Spin condition variables** ([`SpinCondvar`], [`CountingSpinCondvar`]):
//!   mutex-free notification with optional deadlines, built on the backoff.
//! - **Reclaimable object** ([`ReclaimObject`]): a concurrent single-value
//!   store with wait-free reads, lock-free publication and explicit,
//!   epoch-guarded reclamation of overwritten values.
//!
//! Supporting pieces — the platform pause layer ([`pause`]), the atomic
//! owning pointer ([`AtomicBox`]) and a single-writer [`SeqLock`] — are
//! exported as well.
//!
//! # Example
//!
//! ```rust
//! use sakin::ReclaimObject;
//! use std::thread;
//!
//! let obj: ReclaimObject<u64> = ReclaimObject::new(0);
//!
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         let reader = obj.reader().unwrap();
//!         let value = reader.read_lock();
//!         // *value is stable here no matter how often writers publish
//!         let _ = *value;
//!     });
//!     s.spawn(|| {
//!         obj.update(42);
//!         obj.reclaim();
//!     });
//! });
//! ```
//!
//! # Supported targets
//!
//! x86, x86_64 and aarch64. Other architectures fail to compile: the backoff
//! schedules are built around calibrated `pause`/`wfe` timings and there is
//! no meaningful portable fallback.

#![warn(missing_docs)]

mod backoff;
mod condvar;
mod error;
mod owned;
/// Platform pause layer: CPU hint instruction, calibrated hint cost, OS
/// yield and timed sleep.
pub mod pause;
mod reclaim;
mod seqlock;

pub use backoff::{
    progressive_backoff_wait, progressive_backoff_wait_exp, progressive_backoff_wait_staged,
};
pub use condvar::{CountingSpinCondvar, SpinCondvar};
pub use error::Error;
pub use owned::AtomicBox;
pub use reclaim::{ReadGuard, Reader, ReclaimObject, WriteGuard};
pub use seqlock::SeqLock;
