//! Concurrent single-value store with wait-free reads, lock-free publication
//! and deferred reclamation of superseded values.
//!
//! [`ReclaimObject`] stores one value of type `T` and lets any number of
//! threads read and replace it concurrently. Readers are always wait-free
//! and never block writers; writers may block other writers. Overwritten
//! values go onto a zombie list and are destroyed by an explicit call to
//! [`reclaim`](ReclaimObject::reclaim) once no reader can still reference
//! them.
//!
//! The principle is close to RCU, with two deliberate differences:
//! reclamation is managed per object rather than in a global domain, and it
//! never happens on its own — the user calls `reclaim()` periodically (for
//! example on a timer, or from the write side via
//! [`write_and_reclaim_lock`](ReclaimObject::write_and_reclaim_lock)).
//!
//! Each reader-owning thread is bound to one of `MAX_THREADS` pre-allocated,
//! cache-aligned reader records. The record carries the thread's protection
//! epoch; the reclamation scan compares it against each zombie's retirement
//! epoch to decide what is safe to destroy.

use crate::error::Error;
use crate::owned::AtomicBox;
use crate::pause::cpu_pause;
use core::cell::{Cell, UnsafeCell};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use portable_atomic::AtomicU64;
use std::cell::RefCell;
use std::collections::HashMap;

// Object identities for the thread-local slot bindings. Monotonic and never
// reused, so a stale entry for a dropped object can never alias a new one.
static OBJECT_IDS: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    // object id -> reader slot index, for every reclaim object this thread
    // has ever read. Entries for dropped objects stay behind; they are a few
    // bytes each and ids are never recycled.
    static READER_SLOTS: RefCell<HashMap<u64, usize, foldhash::fast::FixedState>> =
        RefCell::new(HashMap::default());
}

/// Per-thread reader record, padded out to a cache line (64 bytes on x86,
/// 128 on Apple M-series / Neoverse) so neighbouring threads' epoch stores
/// never share one.
///
/// `min_epoch` is atomic because the reclamation scan reads it from other
/// threads. `value_snap` and `nesting` are plain cells: they are touched
/// only by the slot-owning thread.
#[cfg_attr(target_arch = "aarch64", repr(align(128)))]
#[cfg_attr(not(target_arch = "aarch64"), repr(align(64)))]
struct ReaderSlot<T> {
    min_epoch: AtomicU64,
    value_snap: Cell<*const T>,
    nesting: Cell<u32>,
}

impl<T> ReaderSlot<T> {
    fn new() -> Self {
        Self {
            min_epoch: AtomicU64::new(0),
            value_snap: Cell::new(ptr::null()),
            nesting: Cell::new(0),
        }
    }
}

struct Zombie<T> {
    retired_at: u64,
    value: Box<T>,
}

/// The zombie list and the spinlock that serializes its accessors.
///
/// Only writers (retiring a superseded value) and reclaimers ever take the
/// lock; readers never touch it, which is what keeps the read side
/// wait-free. With contention limited to those two parties, acquisition is
/// a bare CAS with a pause-spin while the holder finishes.
struct ZombieList<T> {
    locked: AtomicBool,
    entries: UnsafeCell<Vec<Zombie<T>>>,
}

impl<T> ZombieList<T> {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            entries: UnsafeCell::new(Vec::new()),
        }
    }

    fn lock(&self) -> ZombieGuard<'_, T> {
        loop {
            match self.locked.compare_exchange_weak(
                false,
                true,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return ZombieGuard { list: self },
                Err(_) => {
                    // Wait out the holder on a cached load before retrying
                    // the read-modify-write.
                    while self.locked.load(Ordering::Relaxed) {
                        cpu_pause();
                    }
                }
            }
        }
    }
}

/// Holds the zombie lock; released on drop.
struct ZombieGuard<'a, T> {
    list: &'a ZombieList<T>,
}

impl<T> ZombieGuard<'_, T> {
    fn entries(&mut self) -> &mut Vec<Zombie<T>> {
        // SAFETY: the lock is held for this guard's lifetime and every
        // accessor of the list goes through it.
        unsafe { &mut *self.list.entries.get() }
    }
}

impl<T> Drop for ZombieGuard<'_, T> {
    fn drop(&mut self) {
        self.list.locked.store(false, Ordering::Release);
    }
}

/// A value of type `T` with concurrent read/write access and deferred
/// reclamation of overwritten values.
///
/// `MAX_THREADS` (default 128) sizes the reader-slot array and caps the
/// number of distinct threads that may ever read this object. A slot, once
/// bound to a thread, stays bound for the object's lifetime.
///
/// # Example
///
/// ```
/// use sakin::ReclaimObject;
///
/// let obj: ReclaimObject<String> = ReclaimObject::new("hello".into());
/// let reader = obj.reader().unwrap();
///
/// let snapshot = reader.read_lock();
/// obj.update("world".into());
/// assert_eq!(*snapshot, "hello"); // old value pinned by the live guard
/// drop(snapshot);
///
/// assert_eq!(*reader.read_lock(), "world");
/// obj.reclaim(); // "hello" is destroyed here
/// ```
///
/// # Progress guarantees
///
/// Reads are wait-free: acquiring and releasing a [`ReadGuard`] is a handful
/// of atomic stores on the thread's own cache line. Writes are lock-free at
/// the publication point (one atomic exchange) and then serialize with other
/// writers and with reclaimers on an internal spinlock around the zombie
/// list. Reclamation never blocks readers.
pub struct ReclaimObject<T, const MAX_THREADS: usize = 128> {
    value: AtomicBox<T>,
    slots: Box<[ReaderSlot<T>]>,
    zombies: ZombieList<T>,
    // Bumped under the zombie lock so epoch assignment is totally ordered
    // with respect to retirements. 64 bits: must never wrap.
    current_epoch: AtomicU64,
    next_slot: AtomicUsize,
    object_id: u64,
}

// SAFETY: the Cell fields inside reader slots are only ever accessed by the
// slot-owning thread; the thread-local binding in `reader()` hands each
// thread a distinct slot and guards are !Send. Everything crossing threads
// (value, epochs, zombie list) is atomic or lock-protected.
unsafe impl<T: Send + Sync, const MAX_THREADS: usize> Sync for ReclaimObject<T, MAX_THREADS> {}
unsafe impl<T: Send, const MAX_THREADS: usize> Send for ReclaimObject<T, MAX_THREADS> {}

impl<T, const MAX_THREADS: usize> ReclaimObject<T, MAX_THREADS> {
    /// Creates a reclaim object containing `value`, pre-allocating all
    /// `MAX_THREADS` reader records.
    pub fn new(value: T) -> Self {
        let slots = (0..MAX_THREADS).map(|_| ReaderSlot::new()).collect();
        Self {
            value: AtomicBox::new(Box::new(value)),
            slots,
            zombies: ZombieList::new(),
            current_epoch: AtomicU64::new(1),
            next_slot: AtomicUsize::new(0),
            object_id: OBJECT_IDS.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the calling thread's reader handle, binding the thread to a
    /// reader slot on first use.
    ///
    /// # Errors
    ///
    /// [`Error::TooManyThreads`] if this thread has no binding yet and all
    /// `MAX_THREADS` slots are taken. Slots are never reclaimed from
    /// finished threads.
    pub fn reader(&self) -> Result<Reader<'_, T, MAX_THREADS>, Error> {
        let index = READER_SLOTS.with(|slots| {
            let mut slots = slots.borrow_mut();
            match slots.get(&self.object_id) {
                Some(&index) => Ok(index),
                None => {
                    let index = self.next_slot.fetch_add(1, Ordering::Relaxed);
                    if index >= MAX_THREADS {
                        return Err(Error::TooManyThreads {
                            max_threads: MAX_THREADS,
                        });
                    }
                    slots.insert(self.object_id, index);
                    Ok(index)
                }
            }
        })?;
        Ok(Reader {
            obj: self,
            slot: &self.slots[index],
        })
    }

    /// Acquires a scoped read lock for the calling thread.
    ///
    /// Convenience for [`reader()`](Self::reader) followed by
    /// [`Reader::read_lock`]; fails only on slot exhaustion.
    pub fn read_lock(&self) -> Result<ReadGuard<'_, T>, Error> {
        Ok(self.reader()?.read_lock())
    }

    /// Returns a copy of the current value.
    ///
    /// Wait-free whenever `T::clone` is.
    pub fn get_value(&self) -> Result<T, Error>
    where
        T: Clone,
    {
        Ok(self.reader()?.get_value())
    }

    /// Replaces the current value, retiring the previous one onto the
    /// zombie list.
    ///
    /// The new value is boxed before anything is published, so an allocation
    /// failure leaves the object untouched.
    pub fn update(&self, value: T) {
        self.exchange_and_retire(Box::new(value));
    }

    /// Returns a scoped write lock initialized with a deep copy of the
    /// current value.
    ///
    /// Mutate through the guard; the new value is atomically published when
    /// the guard drops, and the previous value is retired. Useful for
    /// touching a single field of a larger struct.
    pub fn write_lock(&self) -> WriteGuard<'_, T, MAX_THREADS>
    where
        T: Clone,
    {
        WriteGuard {
            obj: self,
            new_value: ManuallyDrop::new(Box::new(self.clone_current())),
            reclaim_on_drop: false,
            _not_send: PhantomData,
        }
    }

    /// Like [`write_lock`](Self::write_lock), but also runs a reclamation
    /// pass right after publishing.
    pub fn write_and_reclaim_lock(&self) -> WriteGuard<'_, T, MAX_THREADS>
    where
        T: Clone,
    {
        WriteGuard {
            obj: self,
            new_value: ManuallyDrop::new(Box::new(self.clone_current())),
            reclaim_on_drop: true,
            _not_send: PhantomData,
        }
    }

    /// Destroys every zombie that no reader can still reference.
    ///
    /// A zombie retired at epoch `e` survives while some reader record holds
    /// `0 < min_epoch <= e`; everything else is dropped and the list is
    /// compacted. Blocks concurrent writers and reclaimers for the duration
    /// of the scan; never blocks readers. Infallible.
    pub fn reclaim(&self) {
        let mut zombies = self.zombies.lock();
        zombies
            .entries()
            .retain(|z| self.has_readers_using_epoch(z.retired_at));
    }

    /// Number of retired values currently awaiting reclamation.
    pub fn zombie_count(&self) -> usize {
        self.zombies.lock().entries().len()
    }

    fn clone_current(&self) -> T
    where
        T: Clone,
    {
        // Copy under the zombie lock: a concurrent writer can exchange the
        // value out, but cannot retire it (and reclaim cannot free it) until
        // the lock is released, so the pointee stays alive for the clone.
        let _zombies = self.zombies.lock();
        let current = self.value.load();
        // SAFETY: `current` is non-null (the cell always owns a value) and
        // cannot be freed while the zombie lock is held.
        unsafe { (*current).clone() }
    }

    fn exchange_and_retire(&self, new_value: Box<T>) {
        let old_value = self.value.exchange(new_value);

        let mut zombies = self.zombies.lock();
        // The epoch is taken after the exchange: any reader whose min_epoch
        // exceeds the value recorded here snapshotted after the new
        // publication and cannot reference `old_value`.
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        zombies.entries().push(Zombie {
            retired_at: epoch,
            value: old_value,
        });
    }

    fn has_readers_using_epoch(&self, epoch: u64) -> bool {
        self.slots.iter().any(|slot| {
            let reader_epoch = slot.min_epoch.load(Ordering::SeqCst);
            reader_epoch != 0 && reader_epoch <= epoch
        })
    }
}

impl<T: Default, const MAX_THREADS: usize> Default for ReclaimObject<T, MAX_THREADS> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A thread's handle onto its pre-bound reader record.
///
/// Obtained from [`ReclaimObject::reader`]; valid for the lifetime of the
/// object. The handle is tied to the thread that requested it and cannot be
/// sent to another thread.
pub struct Reader<'a, T, const MAX_THREADS: usize> {
    obj: &'a ReclaimObject<T, MAX_THREADS>,
    slot: &'a ReaderSlot<T>,
}

impl<'a, T, const MAX_THREADS: usize> Reader<'a, T, MAX_THREADS> {
    /// Acquires a scoped read lock on the current value. Wait-free.
    ///
    /// Nested locks on the same reader share the outermost lock's snapshot,
    /// so a sequence of nested reads observes one consistent value; the
    /// outermost release is the one that ends protection.
    pub fn read_lock(&self) -> ReadGuard<'a, T> {
        let slot = self.slot;
        let nesting = slot.nesting.get();
        slot.nesting.set(nesting + 1);
        if nesting == 0 {
            // Epoch first, snapshot second: the value loaded below can only
            // be retired at an epoch >= the one recorded here.
            slot.min_epoch.store(
                self.obj.current_epoch.load(Ordering::SeqCst),
                Ordering::SeqCst,
            );
            slot.value_snap.set(self.obj.value.load());
        }
        ReadGuard {
            slot,
            _not_send: PhantomData,
        }
    }

    /// Returns a copy of the current value.
    ///
    /// Wait-free whenever `T::clone` is.
    pub fn get_value(&self) -> T
    where
        T: Clone,
    {
        let guard = self.read_lock();
        (*guard).clone()
    }
}

/// Scoped read access to a [`ReclaimObject`]'s value.
///
/// While the guard is alive, dereferencing yields the value that was current
/// at (or momentarily after) acquisition, and that value is protected from
/// reclamation. The guard is neither copyable nor sendable; acquisition and
/// release pair on the owning thread along every exit path.
pub struct ReadGuard<'r, T> {
    slot: &'r ReaderSlot<T>,
    _not_send: PhantomData<*mut ()>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the snapshot was set non-null at outermost acquisition and
        // is kept alive by this slot's non-zero min_epoch until the
        // outermost guard drops.
        unsafe { &*self.slot.value_snap.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        let nesting = self.slot.nesting.get() - 1;
        self.slot.nesting.set(nesting);
        if nesting == 0 {
            // Snapshot cleared before the epoch: once min_epoch reads zero
            // there is nothing left to protect.
            self.slot.value_snap.set(ptr::null());
            self.slot.min_epoch.store(0, Ordering::SeqCst);
        }
    }
}

/// Scoped write access to a [`ReclaimObject`]'s value.
///
/// Created holding a deep copy of the current value; mutate it through
/// `Deref`/`DerefMut`. Dropping the guard atomically publishes the new value
/// and retires the previous one. Not copyable, not sendable.
pub struct WriteGuard<'a, T: Clone, const MAX_THREADS: usize> {
    obj: &'a ReclaimObject<T, MAX_THREADS>,
    new_value: ManuallyDrop<Box<T>>,
    reclaim_on_drop: bool,
    _not_send: PhantomData<*mut ()>,
}

impl<T: Clone, const MAX_THREADS: usize> Deref for WriteGuard<'_, T, MAX_THREADS> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &**self.new_value
    }
}

impl<T: Clone, const MAX_THREADS: usize> DerefMut for WriteGuard<'_, T, MAX_THREADS> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut **self.new_value
    }
}

impl<T: Clone, const MAX_THREADS: usize> Drop for WriteGuard<'_, T, MAX_THREADS> {
    fn drop(&mut self) {
        // SAFETY: taken exactly once; the field is never touched again.
        let new_value = unsafe { ManuallyDrop::take(&mut self.new_value) };
        self.obj.exchange_and_retire(new_value);
        if self.reclaim_on_drop {
            self.obj.reclaim();
        }
    }
}
