//! Tick-based time: the global clock and sleep support.
//!
//! The platform timer calls [`interrupt`] once per interrupt at
//! [`TIMER_FREQ`] Hz. Everything else in the crate measures time in ticks
//! of that clock.

pub mod tick;

pub use tick::TickCounter;

/// Timer interrupt frequency, in Hz.
pub const TIMER_FREQ: u32 = 100;

/// Ticks a thread may run before the scheduler preempts it.
pub const TIME_SLICE: u32 = 4;

/// The global clock, incremented once per timer interrupt.
pub static CLOCK: TickCounter = TickCounter::new(TIMER_FREQ);

/// Ticks elapsed since boot.
pub fn ticks() -> i64 {
    CLOCK.ticks()
}

/// Timer interrupt entry point.
///
/// Advances the clock and runs the scheduler's per-tick work. Returns `true`
/// when the interrupt-exit path must yield the processor: the platform
/// handler should call [`crate::yield_now`] on the way out, after the
/// interrupt itself has been acknowledged.
pub fn interrupt() -> bool {
    let now = CLOCK.increment();
    crate::kernel::kernel().tick(now)
}

/// Block the calling thread for at least `duration` ticks.
///
/// The thread wakes at or after `ticks() + duration`, never before; a
/// higher-priority runnable thread may delay the wakeup further.
/// Non-positive durations return immediately.
pub fn sleep(duration: i64) {
    if duration <= 0 {
        return;
    }
    let wake = ticks() + duration;
    crate::kernel::kernel().sleep_until(wake);
}
