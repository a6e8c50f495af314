//! Thread descriptors and lifecycle types.
//!
//! Each thread is described by a [`Thread`] record: identity, lifecycle
//! state, saved execution context, base and effective priority, sleep
//! deadline, MLFQS statistics, and the donation bookkeeping used for
//! priority inheritance. Descriptors live in the scheduler's thread table
//! and are only touched with interrupts disabled.

use crate::arch::SavedContext;
use crate::mem::Stack;
use crate::sched::fixed::Fixed;
use crate::sync::LockId;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

pub mod builder;
#[cfg(feature = "userprog")]
pub mod process;

pub use builder::ThreadBuilder;

/// Lowest priority.
pub const PRI_MIN: u8 = 0;
/// Default priority.
pub const PRI_DEFAULT: u8 = 31;
/// Highest priority.
pub const PRI_MAX: u8 = 63;

/// Lowest niceness.
pub const NICE_MIN: i8 = -20;
/// Default niceness.
pub const NICE_DEFAULT: i8 = 0;
/// Highest niceness.
pub const NICE_MAX: i8 = 20;

/// Maximum length of a thread's debug name, in bytes.
pub const NAME_MAX: usize = 15;

/// Sentinel stored at the tail of every descriptor. A mismatch means the
/// descriptor was overwritten, almost always by a stack overflow.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Canary written at the overflow end of every thread stack.
pub const STACK_CANARY: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// Thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(u64);

impl Tid {
    pub(crate) fn new(id: u64) -> Self {
        Tid(id)
    }

    /// Get the raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States in a thread's life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Not running but ready to run
    Ready,
    /// Currently executing
    Running,
    /// Waiting for an event: a wake tick, a semaphore, a lock, a condition
    Blocked,
    /// About to be destroyed; resources reclaimed by the next scheduled thread
    Dying,
}

/// A kernel thread descriptor.
///
/// The scheduler owns every field except `process`, which belongs to the
/// external process layer and is merely preserved across context switches.
pub struct Thread {
    pub(crate) tid: Tid,
    pub(crate) name: heapless::String<NAME_MAX>,
    pub(crate) state: ThreadState,
    /// `None` only for the boot thread, which runs on the boot stack
    pub(crate) stack: Option<Stack>,
    /// Boxed so its address stays stable across thread-table growth
    pub(crate) context: Box<SavedContext>,
    /// Priority the thread was created with or last set itself to
    pub(crate) own_priority: u8,
    /// Priority used for scheduling; ≥ `own_priority` under donation
    pub(crate) priority: u8,
    /// Wake tick; meaningful only while blocked in the sleep queue
    pub(crate) wakeup: i64,
    pub(crate) nice: i8,
    pub(crate) recent_cpu: Fixed,
    /// Ticks consumed of the current time slice
    pub(crate) slice_ticks: u32,
    /// Threads currently donating their priority into this one
    pub(crate) donators: Vec<Tid>,
    /// The lock this thread is blocked on, if any
    pub(crate) waiting_on: Option<LockId>,
    #[cfg(feature = "userprog")]
    pub process: process::ProcessInfo,
    pub(crate) magic: u32,
}

impl Thread {
    pub(crate) fn new(tid: Tid, name: &str, priority: u8, stack: Option<Stack>) -> Thread {
        Thread {
            tid,
            name: truncated(name),
            state: ThreadState::Ready,
            stack,
            context: Box::default(),
            own_priority: priority,
            priority,
            wakeup: 0,
            nice: NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            slice_ticks: 0,
            donators: Vec::new(),
            waiting_on: None,
            #[cfg(feature = "userprog")]
            process: process::ProcessInfo::new(),
            magic: THREAD_MAGIC,
        }
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Effective priority: the one scheduling decisions use.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Base priority, before any donation.
    pub fn base_priority(&self) -> u8 {
        self.own_priority
    }

    pub fn nice(&self) -> i8 {
        self.nice
    }

    pub(crate) fn context_ptr(&self) -> *mut SavedContext {
        // The box keeps the context at a stable address while the thread
        // table reallocates around it.
        &*self.context as *const SavedContext as *mut SavedContext
    }

    /// Fatal check that this descriptor has not been overwritten.
    pub(crate) fn assert_alive(&self) {
        assert!(
            self.magic == THREAD_MAGIC,
            "thread descriptor corrupted (stack overflow?)"
        );
        if let Some(stack) = &self.stack {
            assert!(
                stack.check_canary(STACK_CANARY),
                "stack canary clobbered in thread {}",
                self.tid
            );
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("name", &self.name.as_str())
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("own_priority", &self.own_priority)
            .finish()
    }
}

fn truncated(name: &str) -> heapless::String<NAME_MAX> {
    let mut out = heapless::String::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
