//! Platform pause layer: the CPU hint instruction, its calibrated cost, and
//! the two ways of giving time back to the OS.
//!
//! `pause` (x86) and `wfe`/`isb` (aarch64) release pipeline and SMT-sibling
//! resources without surrendering the OS time slice, and avoid the
//! memory-order pipeline flush a plain load loop would incur. The per-hint
//! cost differs by two orders of magnitude between architectures, so all
//! schedule arithmetic in [`crate::backoff`] goes through [`T_PAUSE_NS`].

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64"
)))]
compile_error!("sakin supports x86, x86_64 and aarch64 only");

/// Calibrated cost of one [`cpu_pause`] in nanoseconds.
///
/// These are measured constants for typical desktop/server cores. They feed
/// the backoff schedule; correctness never depends on them being exact for
/// the machine at hand.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub const T_PAUSE_NS: u64 = 35;

#[cfg(all(target_arch = "aarch64", not(feature = "isb")))]
pub const T_PAUSE_NS: u64 = 970;

#[cfg(all(target_arch = "aarch64", feature = "isb"))]
pub const T_PAUSE_NS: u64 = 10;

/// Emits a single architecture-appropriate CPU hint instruction.
///
/// x86/x86_64: `pause`. aarch64: `wfe`, or `isb sy` with the `isb` feature
/// (wfe wakes on event-register activity and runs ~1 µs; isb is a plain
/// pipeline flush at ~10 ns for cores that need finer-grained stages).
#[inline(always)]
pub fn cpu_pause() {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    core::hint::spin_loop();

    #[cfg(all(target_arch = "aarch64", not(feature = "isb")))]
    // SAFETY: wfe has no memory or register effects visible to Rust.
    unsafe {
        core::arch::asm!("wfe", options(nomem, nostack, preserves_flags));
    }

    #[cfg(all(target_arch = "aarch64", feature = "isb"))]
    // SAFETY: isb has no memory or register effects visible to Rust.
    unsafe {
        core::arch::asm!("isb sy", options(nomem, nostack, preserves_flags));
    }
}

/// Surrenders the remainder of the time slice to the OS scheduler.
#[inline]
pub fn yield_now() {
    std::thread::yield_now();
}

/// Parks the calling thread for at least `ns` nanoseconds.
///
/// This is the only operation in the pause layer that enters the kernel; the
/// backoff schedules it only past the configured sleep threshold.
#[inline]
pub fn sleep_for(ns: u64) {
    std::thread::sleep(std::time::Duration::from_nanos(ns));
}

/// Emits `N` CPU hints through a compile-time-counted loop.
///
/// For the small constants used in the tight backoff stages the optimizer
/// unrolls this to straight-line hint instructions; large counts stay as a
/// trivial two-instruction loop, which is accurate enough once the stage
/// itself is tens of microseconds long.
#[inline(always)]
pub(crate) fn pause_burst<const N: u64>() {
    let mut i = 0;
    while i < N {
        cpu_pause();
        i += 1;
    }
}

/// Runtime-counted hint burst, for counts derived from const parameters that
/// cannot appear in const-generic position on stable Rust.
#[inline]
pub(crate) fn pause_burst_n(n: u64) {
    let mut i = 0;
    while i < n {
        cpu_pause();
        i += 1;
    }
}
