//! The monotonic tick counter.

use portable_atomic::{AtomicI64, Ordering};

/// Global tick counter for system uptime and scheduling.
///
/// Incremented on every timer interrupt; the signed 64-bit count is the unit
/// wake deadlines are expressed in.
pub struct TickCounter {
    ticks: AtomicI64,
    frequency: u32,
}

impl TickCounter {
    /// Create a new tick counter with the given frequency in Hz.
    pub const fn new(frequency: u32) -> Self {
        Self {
            ticks: AtomicI64::new(0),
            frequency,
        }
    }

    /// Advance the counter by one tick and return the new count.
    ///
    /// Only the timer interrupt handler should call this.
    pub fn increment(&self) -> i64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Get the current tick count.
    pub fn ticks(&self) -> i64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Get the tick frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Convert ticks to whole milliseconds.
    pub fn ticks_to_ms(&self, ticks: i64) -> i64 {
        ticks * 1000 / self.frequency as i64
    }
}
