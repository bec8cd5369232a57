//! Behavioral tests for the progressive-backoff wait.

use sakin::{progressive_backoff_wait, progressive_backoff_wait_exp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn returns_immediately_when_predicate_holds() {
    let mut calls = 0u32;
    progressive_backoff_wait(|| {
        calls += 1;
        true
    });
    assert_eq!(calls, 1);
}

#[test]
fn predicate_checked_before_every_delay() {
    // The wait must return on the exact call where the predicate flips,
    // regardless of which phase it is in.
    for flip_at in [1u32, 3, 17, 80] {
        let mut calls = 0u32;
        progressive_backoff_wait(|| {
            calls += 1;
            calls >= flip_at
        });
        assert_eq!(calls, flip_at);
    }
}

#[test]
fn wakes_after_external_flag_flip() {
    let flag = Arc::new(AtomicBool::new(false));

    let setter = {
        let flag = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            flag.store(true, Ordering::SeqCst);
        })
    };

    let start = Instant::now();
    progressive_backoff_wait(|| flag.load(Ordering::SeqCst));
    let elapsed = start.elapsed();

    setter.join().unwrap();
    assert!(elapsed >= Duration::from_millis(9));
    // Generous CI bound; the schedule's check gap is well under 1 ms.
    assert!(elapsed < Duration::from_millis(200), "woke after {elapsed:?}");
}

#[test]
fn pure_exp_iteration_count_is_logarithmic() {
    // With a 1 ms cap, the schedule takes one check per doubling below the
    // cap and then one check per capped sleep. A predicate flipping at
    // +5 ms must therefore be polled only a few dozen times, not millions.
    let flag = Arc::new(AtomicBool::new(false));

    let setter = {
        let flag = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            flag.store(true, Ordering::SeqCst);
        })
    };

    let mut calls = 0u64;
    let start = Instant::now();
    progressive_backoff_wait_exp::<1, 1_000_000, 100_000, _>(|| {
        calls += 1;
        flag.load(Ordering::SeqCst)
    });
    let elapsed = start.elapsed();

    setter.join().unwrap();
    // log2(1 ms / 35 ns) ~ 15 doubling steps, plus a handful of capped
    // sleeps; leave slack for scheduler jitter on loaded CI machines.
    assert!(calls <= 64, "predicate polled {calls} times");
    assert!(elapsed >= Duration::from_millis(4));
    assert!(elapsed < Duration::from_millis(200), "woke after {elapsed:?}");
}

#[test]
fn pure_exp_immediate_predicate() {
    let mut calls = 0u32;
    progressive_backoff_wait_exp::<1, 1_000_000, 100_000, _>(|| {
        calls += 1;
        true
    });
    assert_eq!(calls, 1);
}

#[test]
fn pure_exp_cap_keeps_polling() {
    // Flip long after the schedule has saturated at the cap; the wait must
    // still return promptly once the predicate holds.
    let flag = Arc::new(AtomicBool::new(false));

    let setter = {
        let flag = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::SeqCst);
        })
    };

    let start = Instant::now();
    progressive_backoff_wait_exp::<1, 500_000, 50_000, _>(|| flag.load(Ordering::SeqCst));
    let elapsed = start.elapsed();

    setter.join().unwrap();
    assert!(elapsed >= Duration::from_millis(29));
    assert!(elapsed < Duration::from_millis(300), "woke after {elapsed:?}");
}

#[test]
fn predicate_panic_propagates() {
    let result = std::panic::catch_unwind(|| {
        let mut calls = 0u32;
        progressive_backoff_wait(|| {
            calls += 1;
            if calls == 5 {
                panic!("predicate failure");
            }
            false
        });
    });
    assert!(result.is_err());
}
