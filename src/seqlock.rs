//! Sequence lock: version-validated reads of a `Copy` value.
//!
//! Readers copy the data out and validate an even, unchanged version counter
//! around the copy, retrying on conflict; they never block the writer.
//! Writing takes two version bumps around the store. The protocol assumes a
//! single writer at a time — that contract is the caller's to uphold and is
//! not enforced here.

use crate::pause::cpu_pause;
use core::cell::UnsafeCell;
use core::sync::atomic::{fence, Ordering};
use portable_atomic::AtomicU64;

/// Version counter on its own cache line (64 bytes on x86, 128 on Apple
/// M-series / Neoverse) so reader validation loads do not false-share with
/// the data.
#[cfg_attr(target_arch = "aarch64", repr(align(128)))]
#[cfg_attr(not(target_arch = "aarch64"), repr(align(64)))]
struct Version(AtomicU64);

/// A single-writer, multi-reader versioned cell for `Copy` data.
///
/// Readers ([`try_read`](SeqLock::try_read), [`read`](SeqLock::read), and
/// the zero-copy [`try_read_with`](SeqLock::try_read_with) /
/// [`read_with`](SeqLock::read_with)) are lock-free and retry on conflict;
/// the writer ([`write`](SeqLock::write), [`update`](SeqLock::update)) is
/// never blocked by readers.
///
/// # Contract
///
/// At most one thread may write at a time. Concurrent writers corrupt the
/// version protocol; if multiple writers are possible, serialize them
/// externally.
pub struct SeqLock<T> {
    version: Version,
    data: UnsafeCell<T>,
}

// SAFETY: reads validate the version counter around the copy and retry on
// conflict; the single-writer contract is documented on the type.
unsafe impl<T: Send> Send for SeqLock<T> {}
unsafe impl<T: Send + Sync> Sync for SeqLock<T> {}

impl<T: Copy> SeqLock<T> {
    /// Creates a `SeqLock` holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            version: Version(AtomicU64::new(0)),
            data: UnsafeCell::new(value),
        }
    }

    /// Attempts a consistent read without retrying.
    ///
    /// Returns `None` if a write was in progress or completed during the
    /// read.
    #[inline]
    pub fn try_read(&self) -> Option<T> {
        let v1 = self.version.0.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }

        // SAFETY: the value is Copy; a torn copy is discarded below when the
        // version check fails.
        let value = unsafe { *self.data.get() };

        fence(Ordering::Acquire);

        let v2 = self.version.0.load(Ordering::Relaxed);
        if v1 != v2 {
            return None;
        }

        Some(value)
    }

    /// Reads the value, spinning until a consistent copy is obtained.
    #[inline]
    pub fn read(&self) -> T {
        loop {
            if let Some(value) = self.try_read() {
                return value;
            }
            cpu_pause();
        }
    }

    /// Stores a new value.
    ///
    /// Single-writer contract applies; see the type documentation.
    #[inline]
    pub fn write(&self, value: T) {
        self.update(|data| *data = value);
    }

    /// Mutates the value in place through a closure.
    ///
    /// Single-writer contract applies; see the type documentation.
    #[inline]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let v = self.version.0.load(Ordering::Relaxed);
        // Odd version: write in progress.
        self.version.0.store(v.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        // SAFETY: single-writer contract; readers only copy and validate.
        unsafe {
            f(&mut *self.data.get());
        }

        self.version.0.store(v.wrapping_add(2), Ordering::Release);
    }

    /// Current version counter; odd while a write is in flight, bumped by
    /// two per completed write.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.0.load(Ordering::Acquire)
    }

    /// Zero-copy read: the closure observes the data in place and extracts
    /// only what it needs, instead of copying all of `T` out.
    ///
    /// Returns `None` if a write was in progress or completed during the
    /// read. The closure may run against a value that is being overwritten;
    /// its result is discarded in that case and must not be relied on for
    /// anything beyond the returned `Option`.
    #[inline]
    pub fn try_read_with<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let v1 = self.version.0.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }

        // SAFETY: the closure only gets shared access; a result computed
        // from a torn value is discarded by the version check below.
        let result = f(unsafe { &*self.data.get() });

        fence(Ordering::Acquire);

        let v2 = self.version.0.load(Ordering::Relaxed);
        if v1 != v2 {
            return None;
        }

        Some(result)
    }

    /// Zero-copy read with spin-wait: retries
    /// [`try_read_with`](SeqLock::try_read_with) until it validates.
    #[inline]
    pub fn read_with<F, R>(&self, f: F) -> R
    where
        F: Fn(&T) -> R,
    {
        loop {
            if let Some(result) = self.try_read_with(&f) {
                return result;
            }
            cpu_pause();
        }
    }
}

impl<T: Copy + Default> Default for SeqLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
