//! Atomic exclusive-ownership pointer: the publication cell used by
//! [`crate::reclaim::ReclaimObject`].

use core::marker::PhantomData;
use core::sync::atomic::{AtomicPtr, Ordering};

/// A single-cell atomic owner of a heap-allocated `T`.
///
/// `AtomicBox` holds exactly one boxed value. [`exchange`](AtomicBox::exchange)
/// is the sole mutation point: it swaps ownership in one atomic instruction
/// and hands the previous box back to the caller. [`load`](AtomicBox::load)
/// observes the current pointer without affecting ownership; the pointee is
/// only guaranteed alive for as long as the caller can rule out a concurrent
/// exchange-and-drop, which is exactly the guarantee the reclaim machinery
/// layers on top.
///
/// Both operations are lock-free single atomics with sequentially-consistent
/// ordering, so a load that observes a published pointer also observes every
/// write the publishing thread made before the exchange.
pub struct AtomicBox<T> {
    ptr: AtomicPtr<T>,
    _marker: PhantomData<Box<T>>,
}

unsafe impl<T: Send> Send for AtomicBox<T> {}
unsafe impl<T: Send + Sync> Sync for AtomicBox<T> {}

impl<T> AtomicBox<T> {
    /// Creates an `AtomicBox` owning `value`.
    pub fn new(value: Box<T>) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(value)),
            _marker: PhantomData,
        }
    }

    /// Returns the current pointer without transferring ownership.
    ///
    /// Never null for a cell constructed via [`new`](AtomicBox::new). The
    /// returned pointer dangles once a subsequent exchange's box is dropped;
    /// callers must hold their own liveness argument before dereferencing.
    #[inline]
    pub fn load(&self) -> *mut T {
        self.ptr.load(Ordering::SeqCst)
    }

    /// Atomically swaps the owned value for `new`, returning the previous
    /// owner.
    #[inline]
    pub fn exchange(&self, new: Box<T>) -> Box<T> {
        let old = self.ptr.swap(Box::into_raw(new), Ordering::SeqCst);
        // SAFETY: every pointer stored in the cell originates from
        // Box::into_raw and ownership leaves the cell only through this swap.
        unsafe { Box::from_raw(old) }
    }
}

impl<T> Drop for AtomicBox<T> {
    fn drop(&mut self) {
        let ptr = *self.ptr.get_mut();
        if !ptr.is_null() {
            // SAFETY: we own the cell exclusively in drop; the pointer came
            // from Box::into_raw and was never freed elsewhere.
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for AtomicBox<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AtomicBox({:p})", self.load())
    }
}
