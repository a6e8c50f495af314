//! Multi-level feedback queue statistics.
//!
//! Under the MLFQS policy priorities are not set by threads; they are
//! recomputed from per-thread CPU usage and the system load average, all in
//! 17.14 fixed point:
//!
//! - every tick, the running thread's `recent_cpu` gains 1;
//! - every [`PRIORITY_RECALC_INTERVAL`] ticks, every thread's priority
//!   becomes `PRI_MAX - recent_cpu/4 - nice*2`, clamped;
//! - once per second, `load_avg` decays toward the number of runnable
//!   threads and every `recent_cpu` decays by `2*load_avg / (2*load_avg+1)`.
//!
//! The idle thread is excluded from all of it.

use super::fixed::Fixed;
use super::Sched;
use crate::thread::{PRI_MAX, PRI_MIN};

/// Priorities are recomputed every fourth tick.
pub const PRIORITY_RECALC_INTERVAL: i64 = 4;

impl Sched {
    /// Charge the current tick to the running thread.
    pub(crate) fn mlfqs_bump_recent_cpu(&mut self) {
        let cur = self.running();
        if Some(cur) == self.idle {
            return;
        }
        let t = self.thread_mut(cur);
        t.recent_cpu = t.recent_cpu.add_int(1);
    }

    /// `PRI_MAX - recent_cpu/4 - nice*2`, clamped into the priority range.
    pub(crate) fn mlfqs_priority_for(recent_cpu: Fixed, nice: i8) -> u8 {
        let p = PRI_MAX as i32 - recent_cpu.div_int(4).round() - nice as i32 * 2;
        p.clamp(PRI_MIN as i32, PRI_MAX as i32) as u8
    }

    /// Recompute every thread's priority and restore ready-queue order.
    ///
    /// Donation is disabled under MLFQS, so base and effective priority move
    /// together.
    pub(crate) fn mlfqs_recompute_priorities(&mut self) {
        let idle = self.idle;
        for t in self.threads.iter_mut() {
            if Some(t.tid) == idle {
                continue;
            }
            let p = Self::mlfqs_priority_for(t.recent_cpu, t.nice);
            t.own_priority = p;
            t.priority = p;
        }
        self.resort_ready();
    }

    /// `load_avg = (59/60)*load_avg + (1/60)*ready_threads`, where
    /// `ready_threads` counts READY threads plus the running thread unless
    /// it is idle.
    pub(crate) fn mlfqs_update_load_avg(&mut self) {
        let cur = self.running();
        let running = if Some(cur) == self.idle { 0 } else { 1 };
        let ready_threads = self.ready.len() as i32 + running;

        let decay = Fixed::from_ratio(59, 60);
        let gain = Fixed::from_ratio(1, 60);
        self.load_avg = decay.mul(self.load_avg) + gain.mul_int(ready_threads);
    }

    /// `recent_cpu = (2*load_avg)/(2*load_avg + 1) * recent_cpu + nice` for
    /// every thread.
    pub(crate) fn mlfqs_decay_recent_cpu(&mut self) {
        let idle = self.idle;
        let twice_load = self.load_avg.mul_int(2);
        let coefficient = twice_load.div(twice_load.add_int(1));
        for t in self.threads.iter_mut() {
            if Some(t.tid) == idle {
                continue;
            }
            t.recent_cpu = coefficient.mul(t.recent_cpu).add_int(t.nice as i32);
        }
    }

    /// Nice and recent-CPU a child inherits from the running thread.
    pub(crate) fn mlfqs_inherited(&self) -> (i8, Fixed) {
        match self.current {
            Some(cur) => {
                let t = self.thread(cur);
                (t.nice, t.recent_cpu)
            }
            None => (crate::thread::NICE_DEFAULT, Fixed::ZERO),
        }
    }

    /// `round(100 * load_avg)`.
    pub(crate) fn load_avg_x100(&self) -> i32 {
        self.load_avg.mul_int(100).round()
    }
}
