//! Blocking synchronization primitives: semaphores, locks, condition
//! variables.
//!
//! All three are built on the scheduler's block/unblock operations and run
//! their critical sections with interrupts disabled. Wait lists order
//! waiters by effective priority, descending, and are resorted just before
//! a waiter is popped so donations that arrived while a thread was queued
//! still count.
//!
//! Locks participate in priority donation: a thread blocking on a held lock
//! lends its effective priority to the holder, transitively along the chain
//! of locks the holder itself is blocked on. Under the MLFQS policy donation
//! is disabled and the statistics own priorities outright.

use crate::arch::IntrGuard;
use crate::kernel::kernel;
use crate::thread::Tid;

use alloc::vec::Vec;
use portable_atomic::{AtomicU64, Ordering};

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a lock, used as the key of the scheduler's holder map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LockId(u64);

impl LockId {
    pub(crate) fn fresh() -> LockId {
        LockId(NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A counting semaphore.
///
/// A non-negative value plus a wait list. `down` blocks while the value is
/// zero; `up` wakes the highest-priority waiter.
pub struct Semaphore {
    inner: spin::Mutex<SemaphoreInner>,
}

struct SemaphoreInner {
    value: u32,
    waiters: Vec<Tid>,
}

impl Semaphore {
    pub const fn new(value: u32) -> Self {
        Self {
            inner: spin::Mutex::new(SemaphoreInner {
                value,
                waiters: Vec::new(),
            }),
        }
    }

    /// Decrement the value, blocking until it is positive.
    ///
    /// The condition is re-checked after every wakeup; being woken is a
    /// hint, not a grant.
    pub fn down(&self) {
        loop {
            let _guard = IntrGuard::new();
            let kernel = kernel();
            let sched = kernel.sched_lock();
            let mut inner = self.inner.lock();
            if inner.value > 0 {
                inner.value -= 1;
                return;
            }
            let cur = sched.running();
            let at = sched.waiter_position(&inner.waiters, cur);
            inner.waiters.insert(at, cur);
            drop(inner);
            kernel.block_current(sched);
        }
    }

    /// Decrement the value if it is positive, without blocking.
    pub fn try_down(&self) -> bool {
        let _guard = IntrGuard::new();
        let mut inner = self.inner.lock();
        if inner.value > 0 {
            inner.value -= 1;
            true
        } else {
            false
        }
    }

    /// Increment the value and wake the highest-priority waiter, if any.
    ///
    /// Yields when the woken thread outranks the caller, unless called from
    /// within a critical section or interrupt handler, where the pending
    /// preemption is picked up at the next tick or yield point instead.
    pub fn up(&self) {
        let guard = IntrGuard::new();
        let kernel = kernel();
        let mut sched = kernel.sched_lock();
        let mut inner = self.inner.lock();
        inner.value += 1;
        let woken = sched.pick_waiter(&mut inner.waiters);
        drop(inner);

        let mut should_yield = false;
        if let Some(tid) = woken {
            sched.insert_ready(tid);
            if let Some(cur) = sched.current {
                should_yield = sched.effective(tid) > sched.effective(cur);
            }
        }
        drop(sched);

        if should_yield && guard.was_enabled() {
            drop(guard);
            kernel.yield_now();
        }
    }

    /// Current value, for diagnostics.
    pub fn value(&self) -> u32 {
        self.inner.lock().value
    }
}

/// A mutual-exclusion lock with priority donation.
///
/// A binary semaphore plus a holder, tracked in the scheduler so donation
/// chains can be walked. Acquire is not recursive; releasing a lock the
/// caller does not hold is a fatal assertion.
pub struct Lock {
    id: LockId,
    sema: Semaphore,
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock {
    pub fn new() -> Self {
        Self {
            id: LockId::fresh(),
            sema: Semaphore::new(1),
        }
    }

    /// Acquire the lock, blocking until it is free.
    ///
    /// If the lock is held, the caller's effective priority is donated to
    /// the holder (and transitively to whatever the holder waits on) before
    /// blocking.
    pub fn acquire(&self) {
        let _guard = IntrGuard::new();
        let kernel = kernel();
        {
            let mut sched = kernel.sched_lock();
            let cur = sched.running();
            assert!(
                sched.lock_holders.get(&self.id) != Some(&cur),
                "recursive lock acquire"
            );
            if !kernel.mlfqs() {
                sched.donate(cur, self.id);
            }
        }

        self.sema.down();

        let mut sched = kernel.sched_lock();
        let cur = sched.running();
        sched.thread_mut(cur).waiting_on = None;
        sched.lock_holders.insert(self.id, cur);
    }

    /// Acquire the lock without blocking; returns whether it was acquired.
    pub fn try_acquire(&self) -> bool {
        let _guard = IntrGuard::new();
        if !self.sema.try_down() {
            return false;
        }
        let kernel = kernel();
        let mut sched = kernel.sched_lock();
        let cur = sched.running();
        sched.lock_holders.insert(self.id, cur);
        true
    }

    /// Release the lock, restoring the caller's pre-donation priority and
    /// waking the best waiter.
    pub fn release(&self) {
        let kernel = kernel();
        {
            let _guard = IntrGuard::new();
            let mut sched = kernel.sched_lock();
            let cur = sched.running();
            assert!(
                sched.lock_holders.get(&self.id) == Some(&cur),
                "lock released by a thread that does not hold it"
            );
            if !kernel.mlfqs() {
                sched.withdraw_donations(cur, self.id);
            }
            sched.lock_holders.remove(&self.id);
        }
        self.sema.up();
    }

    /// Whether the calling thread holds this lock.
    pub fn held_by_current(&self) -> bool {
        let _guard = IntrGuard::new();
        let sched = kernel().sched_lock();
        match sched.current {
            Some(cur) => sched.lock_holders.get(&self.id) == Some(&cur),
            None => false,
        }
    }
}

/// A condition variable.
///
/// Waiters block until signaled; `signal` wakes the waiter with the highest
/// effective priority at signal time. Must be used with the lock that
/// protects the condition.
pub struct Condvar {
    waiters: spin::Mutex<Vec<Tid>>,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: spin::Mutex::new(Vec::new()),
        }
    }

    /// Atomically release `lock`, block until signaled, then reacquire.
    ///
    /// The caller must hold `lock`; interrupts stay disabled between the
    /// release and the block, so no signal can slip through the gap.
    pub fn wait(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condvar wait without holding the lock");
        let _guard = IntrGuard::new();
        let kernel = kernel();
        {
            let sched = kernel.sched_lock();
            let cur = sched.running();
            self.waiters.lock().push(cur);
        }
        lock.release();
        {
            let sched = kernel.sched_lock();
            kernel.block_current(sched);
        }
        lock.acquire();
    }

    /// Wake the highest-priority waiter, if any. The caller must hold `lock`.
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current(), "condvar signal without holding the lock");
        let guard = IntrGuard::new();
        let kernel = kernel();
        let mut sched = kernel.sched_lock();
        let mut waiters = self.waiters.lock();
        let woken = sched.pick_waiter(&mut waiters);
        drop(waiters);

        let mut should_yield = false;
        if let Some(tid) = woken {
            sched.insert_ready(tid);
            if let Some(cur) = sched.current {
                should_yield = sched.effective(tid) > sched.effective(cur);
            }
        }
        drop(sched);

        if should_yield && guard.was_enabled() {
            drop(guard);
            kernel.yield_now();
        }
    }

    /// Wake every waiter. The caller must hold `lock`.
    pub fn broadcast(&self, lock: &Lock) {
        while !self.waiters.lock().is_empty() {
            self.signal(lock);
        }
    }
}
