//! Behavioral tests for the flag and counting spin condition variables.

use sakin::{CountingSpinCondvar, SpinCondvar};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn notify_before_wait_is_not_lost() {
    let cv = SpinCondvar::new();
    cv.notify();
    // Must return immediately: the signal was committed before wait began.
    cv.wait();
}

#[test]
fn flag_variant_coalesces_notifies() {
    let cv = SpinCondvar::new();
    cv.notify();
    cv.notify();
    cv.notify();

    // Exactly one wait completes on the coalesced signal...
    assert!(cv.wait_for(Duration::from_millis(100)));
    // ...and the next one times out.
    assert!(!cv.wait_for(Duration::from_millis(50)));
}

#[test]
fn counter_variant_counts_notifies() {
    let cv = CountingSpinCondvar::new();
    for _ in 0..3 {
        cv.notify();
    }

    for _ in 0..3 {
        assert!(cv.wait_for(Duration::from_millis(100)));
    }
    assert!(!cv.wait_for(Duration::from_millis(50)));
}

#[test]
fn wait_for_times_out_in_window() {
    let cv = SpinCondvar::new();

    let start = Instant::now();
    let signalled = cv.wait_for(Duration::from_millis(200));
    let elapsed = start.elapsed();

    assert!(!signalled);
    assert!(elapsed >= Duration::from_millis(200));
    // Timeout granularity is one backoff phase delay; allow scheduler slack.
    assert!(elapsed < Duration::from_millis(400), "timed out after {elapsed:?}");
}

#[test]
fn delayed_notify_wakes_waiter() {
    let cv = Arc::new(SpinCondvar::new());

    let notifier = {
        let cv = Arc::clone(&cv);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            cv.notify();
        })
    };

    let start = Instant::now();
    cv.wait();
    let elapsed = start.elapsed();

    notifier.join().unwrap();
    assert!(elapsed >= Duration::from_millis(9));
    assert!(elapsed < Duration::from_millis(200), "woke after {elapsed:?}");
}

#[test]
fn each_counter_notify_wakes_one_waiter() {
    let cv = Arc::new(CountingSpinCondvar::new());
    let woken = Arc::new(AtomicUsize::new(0));
    const WAITERS: usize = 4;

    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let cv = Arc::clone(&cv);
            let woken = Arc::clone(&woken);
            thread::spawn(move || {
                cv.wait();
                woken.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    for _ in 0..WAITERS {
        thread::sleep(Duration::from_millis(5));
        cv.notify();
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), WAITERS);
}

#[test]
fn wait_pred_ignores_the_signal() {
    let cv = CountingSpinCondvar::new();
    cv.notify();

    let flag = AtomicBool::new(true);
    cv.wait_pred(|| flag.load(Ordering::SeqCst));

    // The predicate form must have left the notification untouched.
    assert!(cv.wait_for(Duration::from_millis(100)));
}

#[test]
fn wait_pred_until_reports_timeout() {
    let cv = SpinCondvar::new();

    let deadline = Instant::now() + Duration::from_millis(50);
    assert!(!cv.wait_pred_until(|| false, deadline));

    let deadline = Instant::now() + Duration::from_millis(50);
    assert!(cv.wait_pred_until(|| true, deadline));
}

#[test]
fn notify_makes_prior_writes_visible() {
    let cv = Arc::new(SpinCondvar::new());
    let payload = Arc::new(AtomicUsize::new(0));

    let producer = {
        let cv = Arc::clone(&cv);
        let payload = Arc::clone(&payload);
        thread::spawn(move || {
            payload.store(7, Ordering::SeqCst);
            cv.notify();
        })
    };

    cv.wait();
    assert_eq!(payload.load(Ordering::SeqCst), 7);
    producer.join().unwrap();
}
