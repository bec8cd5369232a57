//! Correctness tests for the reclaimable object.
//!
//! These verify the core guarantees:
//! 1. A read guard pins the value that was current at acquisition
//! 2. Reclamation destroys exactly the zombies no reader can reference
//! 3. Reader slots bind per thread and exhaust with a typed error

use sakin::{Error, ReclaimObject};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Value whose drops are counted, for zombie-reclamation accounting.
struct Tracked {
    value: u64,
    drops: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(value: u64, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            value,
            drops: Arc::clone(drops),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn initial_value_roundtrip() {
    let obj: ReclaimObject<String> = ReclaimObject::new("xxx".into());
    let reader = obj.reader().unwrap();
    assert_eq!(reader.get_value(), "xxx");
}

#[test]
fn read_guard_pins_value_across_update() {
    let obj: ReclaimObject<String> = ReclaimObject::new("hello".into());
    let reader = obj.reader().unwrap();

    let guard = reader.read_lock();
    obj.update("world".into());
    assert_eq!(*guard, "hello");
    drop(guard);

    assert_eq!(*reader.read_lock(), "world");
}

#[test]
fn sequential_guards_observe_latest_value() {
    let obj: ReclaimObject<u64> = ReclaimObject::new(0);
    let reader = obj.reader().unwrap();

    for i in 1..=10u64 {
        obj.update(i);
        assert_eq!(*reader.read_lock(), i);
    }
}

#[test]
fn nested_read_locks_share_the_snapshot() {
    let obj: ReclaimObject<u64> = ReclaimObject::new(1);
    let reader = obj.reader().unwrap();

    let outer = reader.read_lock();
    obj.update(2);

    // The nested lock reuses the outer snapshot rather than re-reading.
    let inner = reader.read_lock();
    assert_eq!(*inner, 1);
    assert_eq!(*outer, 1);

    // Inner release must not end protection while the outer guard lives.
    drop(inner);
    assert_eq!(*outer, 1);
    drop(outer);

    assert_eq!(*reader.read_lock(), 2);
}

#[test]
fn reclaim_destroys_exactly_the_unprotected_zombies() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj: ReclaimObject<Tracked> = ReclaimObject::new(Tracked::new(0, &drops));
    let reader = obj.reader().unwrap();

    obj.update(Tracked::new(1, &drops)); // value 0 retired
    let guard = reader.read_lock(); // pins value 1
    obj.update(Tracked::new(2, &drops)); // value 1 retired

    assert_eq!(obj.zombie_count(), 2);

    // Value 0 was retired before the guard's epoch and must go; value 1 is
    // the guard's own snapshot and must stay.
    obj.reclaim();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(obj.zombie_count(), 1);
    assert_eq!(guard.value, 1);

    drop(guard);
    obj.reclaim();
    assert_eq!(drops.load(Ordering::SeqCst), 2);
    assert_eq!(obj.zombie_count(), 0);
}

#[test]
fn repeated_reclaim_is_idempotent() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj: ReclaimObject<Tracked> = ReclaimObject::new(Tracked::new(0, &drops));

    obj.update(Tracked::new(1, &drops));
    obj.reclaim();
    obj.reclaim();
    obj.reclaim();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn destruction_releases_current_value_and_zombies() {
    let drops = Arc::new(AtomicUsize::new(0));
    {
        let obj: ReclaimObject<Tracked> = ReclaimObject::new(Tracked::new(0, &drops));
        obj.update(Tracked::new(1, &drops));
        obj.update(Tracked::new(2, &drops));
        // No reclaim: both zombies and the current value die with the object.
    }
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn write_lock_edits_a_copy_and_publishes_on_drop() {
    let obj: ReclaimObject<(u64, u64)> = ReclaimObject::new((1, 2));
    let reader = obj.reader().unwrap();

    {
        let mut w = obj.write_lock();
        w.0 = 10;
        // Publication happens only when the guard drops.
        assert_eq!(*reader.read_lock(), (1, 2));
    }
    assert_eq!(*reader.read_lock(), (10, 2));
}

#[test]
fn write_and_reclaim_lock_collects_eagerly() {
    let obj: ReclaimObject<u64> = ReclaimObject::new(0);

    {
        let mut w = obj.write_and_reclaim_lock();
        *w = 1;
    }
    // No readers were active, so the retired value is already gone.
    assert_eq!(obj.zombie_count(), 0);
    assert_eq!(obj.get_value().unwrap(), 1);
}

#[test]
fn same_thread_reuses_its_slot() {
    let obj: ReclaimObject<u64, 1> = ReclaimObject::new(7);

    // Two requests from one thread must not consume two slots.
    let first = obj.reader().unwrap();
    let second = obj.reader().unwrap();
    assert_eq!(first.get_value(), 7);
    assert_eq!(second.get_value(), 7);
}

#[test]
fn slot_exhaustion_is_a_typed_error() {
    let obj: Arc<ReclaimObject<u64, 2>> = Arc::new(ReclaimObject::new(0));

    // Two threads claim the two slots and keep no state behind.
    for _ in 0..2 {
        let obj = Arc::clone(&obj);
        thread::spawn(move || {
            obj.reader().unwrap().get_value();
        })
        .join()
        .unwrap();
    }

    // Slots are never recycled, so a third thread must be refused.
    let obj2 = Arc::clone(&obj);
    let result = thread::spawn(move || obj2.reader().map(|r| r.get_value()))
        .join()
        .unwrap();
    assert_eq!(result, Err(Error::TooManyThreads { max_threads: 2 }));
}

#[test]
fn error_display_names_the_limit() {
    let err = Error::TooManyThreads { max_threads: 128 };
    assert!(err.to_string().contains("128"));
}

#[test]
fn distinct_objects_get_distinct_bindings() {
    // One thread reading two objects must use independent slot sets.
    let a: ReclaimObject<u64, 1> = ReclaimObject::new(1);
    let b: ReclaimObject<u64, 1> = ReclaimObject::new(2);

    let ra = a.reader().unwrap();
    let rb = b.reader().unwrap();
    assert_eq!(ra.get_value(), 1);
    assert_eq!(rb.get_value(), 2);
}
