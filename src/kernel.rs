//! The kernel facade: boot, thread lifecycle, and the scheduling entry
//! points.
//!
//! A single [`Kernel`] instance owns the scheduler state behind one lock.
//! Public operations disable interrupts, take that lock, let the scheduler
//! decide, and perform the context switch through the [`Arch`] seam. The
//! timer collaborator drives preemption by calling [`Kernel::tick`] once per
//! interrupt.

use crate::arch::{Arch, DefaultArch, IntrGuard};
use crate::errors::{SpawnError, SpawnResult};
use crate::mem::{StackPool, StackSizeClass};
use crate::sched::Sched;
use crate::thread::{Thread, ThreadState, Tid, NAME_MAX, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN, STACK_CANARY};

use alloc::boxed::Box;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use spin::{Mutex, MutexGuard, Once};

/// Scheduling policy, fixed at boot.
///
/// Boot code parses the kernel command line (`-o mlfqs` selects MLFQS) and
/// passes the choice here exactly once; it never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Strict priority scheduling with donation
    Priority,
    /// Multi-level feedback queue: priorities computed from CPU usage
    Mlfqs,
}

/// Aggregate scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStats {
    pub total: usize,
    pub ready: usize,
    pub blocked: usize,
    pub idle_ticks: i64,
    pub kernel_ticks: i64,
}

pub struct Kernel {
    sched: Mutex<Sched>,
    stack_pool: StackPool,
    policy: Once<SchedPolicy>,
    started: AtomicBool,
    next_tid: AtomicU64,
}

static KERNEL: Kernel = Kernel::new();

/// The kernel singleton.
pub fn kernel() -> &'static Kernel {
    &KERNEL
}

impl Kernel {
    pub const fn new() -> Self {
        Self {
            sched: Mutex::new(Sched::new()),
            stack_pool: StackPool::new(),
            policy: Once::new(),
            started: AtomicBool::new(false),
            next_tid: AtomicU64::new(1),
        }
    }

    pub(crate) fn sched_lock(&self) -> MutexGuard<'_, Sched> {
        self.sched.lock()
    }

    /// Whether the MLFQS policy is active.
    pub fn mlfqs(&self) -> bool {
        matches!(self.policy.get(), Some(SchedPolicy::Mlfqs))
    }

    // ------------------------------------------------------------------
    // Boot
    // ------------------------------------------------------------------

    /// Initialize the threading core, converting the running boot stack into
    /// the initial thread.
    ///
    /// Must be called exactly once, with interrupts disabled; both are fatal
    /// assertions.
    pub fn init(&self, policy: SchedPolicy) {
        assert!(
            !DefaultArch::interrupts_enabled(),
            "init requires interrupts disabled"
        );
        assert!(!self.policy.is_completed(), "threading core initialized twice");
        self.policy.call_once(|| policy);

        let tid = self.allocate_tid();
        let mut main = Thread::new(tid, "main", PRI_DEFAULT, None);
        main.state = ThreadState::Running;

        let mut sched = self.sched.lock();
        sched.register(main);
        sched.current = Some(tid);
        drop(sched);

        log::info!("threading core initialized, policy {:?}", policy);
    }

    /// Create the idle thread and begin preemptive scheduling.
    ///
    /// Called once, as the boot path is about to enable interrupts. The idle
    /// thread is dispatched if and only if no other thread is ready; it
    /// never enters the ready queue.
    pub fn start(&self) {
        assert!(self.policy.is_completed(), "start before init");
        assert!(!self.started.load(Ordering::Acquire), "threading core started twice");

        let tid = self.allocate_tid();
        let stack = self
            .stack_pool
            .allocate(StackSizeClass::Page)
            .expect("no page for the idle thread");
        stack.install_canary(STACK_CANARY);
        let sp = stack.stack_bottom() as usize;

        let mut idle = Thread::new(tid, "idle", PRI_MIN, Some(stack));
        unsafe {
            DefaultArch::init_context(&mut idle.context, idle_entry as *const () as usize, sp, 0);
        }
        idle.state = ThreadState::Blocked;

        let mut sched = self.sched.lock();
        sched.register(idle);
        sched.idle = Some(tid);
        drop(sched);

        self.started.store(true, Ordering::Release);
        log::info!("scheduler started, idle thread is {}", tid);
        DefaultArch::enable_interrupts();
    }

    // ------------------------------------------------------------------
    // Thread lifecycle
    // ------------------------------------------------------------------

    /// Spawn a kernel thread running `f` at the given priority.
    ///
    /// The descriptor and stack share one page from the pool; the first
    /// dispatch lands in a trampoline that enables interrupts and calls `f`,
    /// and the thread exits when `f` returns. If the new thread outranks the
    /// caller, the caller yields before this returns.
    ///
    /// Under MLFQS the priority argument is ignored: the child inherits the
    /// creator's nice and recent-CPU and gets a computed priority.
    pub fn spawn<F>(&self, name: &str, priority: u8, f: F) -> SpawnResult<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_with(name, priority, StackSizeClass::Page, f)
    }

    pub(crate) fn spawn_with<F>(
        &self,
        name: &str,
        priority: u8,
        stack_class: StackSizeClass,
        f: F,
    ) -> SpawnResult<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.policy.is_completed() {
            return Err(SpawnError::NotInitialized);
        }
        if priority > PRI_MAX {
            return Err(SpawnError::InvalidPriority(priority));
        }
        if name.is_empty() {
            return Err(SpawnError::InvalidName);
        }

        let stack = self
            .stack_pool
            .allocate(stack_class)
            .ok_or(SpawnError::OutOfMemory)?;
        stack.install_canary(STACK_CANARY);
        let sp = stack.stack_bottom() as usize;

        let tid = self.allocate_tid();
        let closure = Box::into_raw(Box::new(f));
        let mut thread = Thread::new(tid, name, priority, Some(stack));
        unsafe {
            DefaultArch::init_context(
                &mut thread.context,
                trampoline::<F> as *const () as usize,
                sp,
                closure as usize,
            );
        }

        let guard = IntrGuard::new();
        let mut sched = self.sched.lock();
        if self.mlfqs() {
            let (nice, recent_cpu) = sched.mlfqs_inherited();
            thread.nice = nice;
            thread.recent_cpu = recent_cpu;
            let computed = Sched::mlfqs_priority_for(recent_cpu, nice);
            thread.own_priority = computed;
            thread.priority = computed;
        }
        let new_priority = thread.priority;
        sched.register(thread);
        sched.insert_ready(tid);
        let preempted = match sched.current {
            Some(cur) => new_priority > sched.effective(cur),
            None => false,
        };
        drop(sched);
        log::info!("spawned thread {} '{}'", tid, name);

        if preempted {
            drop(guard);
            self.yield_now();
        }
        Ok(tid)
    }

    /// Terminate the calling thread. Never returns.
    ///
    /// The descriptor and stack are reclaimed by a later scheduled thread,
    /// never by the dying thread itself.
    pub fn exit(&self) -> ! {
        let _guard = IntrGuard::new();
        let mut sched = self.sched.lock();
        let cur = sched.running();
        assert!(Some(cur) != sched.idle, "the idle thread cannot exit");
        log::info!("thread {} exiting", cur);
        sched.thread_mut(cur).state = ThreadState::Dying;
        self.schedule(sched);
        // A real port never gets here; the context is gone.
        loop {
            DefaultArch::wait_for_interrupt();
        }
    }

    /// Id of the calling thread.
    pub fn current_tid(&self) -> Tid {
        self.with_current(|t| t.tid())
    }

    /// Debug name of the calling thread.
    pub fn current_name(&self) -> heapless::String<NAME_MAX> {
        self.with_current(|t| t.name.clone())
    }

    /// Run `f` against the calling thread's descriptor.
    ///
    /// Every call verifies the descriptor's magic sentinel and stack canary;
    /// a mismatch means the stack overflowed into the descriptor and is
    /// fatal.
    pub fn with_current<R>(&self, f: impl FnOnce(&Thread) -> R) -> R {
        let _guard = IntrGuard::new();
        let sched = self.sched.lock();
        let thread = sched.thread(sched.running());
        thread.assert_alive();
        f(thread)
    }

    /// Run `f` on every live thread descriptor, interrupts disabled
    /// throughout.
    pub fn for_each_thread(&self, mut f: impl FnMut(&Thread)) {
        let _guard = IntrGuard::new();
        let sched = self.sched.lock();
        for thread in sched.threads.iter().filter(|t| t.state != ThreadState::Dying) {
            f(thread);
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Voluntarily give up the processor, keeping the thread runnable.
    pub fn yield_now(&self) {
        if !self.started.load(Ordering::Acquire) {
            return;
        }
        let _guard = IntrGuard::new();
        let mut sched = self.sched.lock();
        if sched.current.is_none() {
            return;
        }
        sched.prepare_requeue_current();
        self.schedule(sched);
    }

    /// Block the calling thread until someone calls [`Kernel::unblock`].
    ///
    /// The caller must have arranged a wake-up first; nothing here will
    /// supply one.
    pub fn block(&self) {
        let _guard = IntrGuard::new();
        let sched = self.sched.lock();
        self.block_current(sched);
    }

    /// Make a blocked thread runnable again.
    ///
    /// Does not preempt: the caller decides whether to yield afterwards.
    /// Unblocking a thread that is not blocked is a fatal assertion.
    pub fn unblock(&self, tid: Tid) {
        let _guard = IntrGuard::new();
        let mut sched = self.sched.lock();
        assert!(
            sched.thread(tid).state == ThreadState::Blocked,
            "unblock of a thread that is not blocked"
        );
        sched.insert_ready(tid);
    }

    /// Sleep until the global clock reaches `wake`.
    pub fn sleep_until(&self, wake: i64) {
        let _guard = IntrGuard::new();
        let mut sched = self.sched.lock();
        let cur = sched.running();
        if Some(cur) == sched.idle {
            return;
        }
        sched.enqueue_sleeper(cur, wake);
        self.schedule(sched);
    }

    /// Per-tick scheduler work, called from the timer interrupt with the
    /// tick count after incrementing.
    ///
    /// Returns `true` when the interrupt-exit path must yield the processor.
    /// Never switches by itself: interrupt handlers do not suspend.
    pub fn tick(&self, now: i64) -> bool {
        if !self.started.load(Ordering::Acquire) {
            return false;
        }
        let mut sched = self.sched.lock();
        sched.tick(now, self.mlfqs())
    }

    /// Mark the current thread blocked and switch away. The interrupt guard
    /// of the caller stays active across the switch.
    pub(crate) fn block_current(&self, mut sched: MutexGuard<'_, Sched>) {
        let cur = sched.running();
        sched.thread_mut(cur).state = ThreadState::Blocked;
        self.schedule(sched);
    }

    /// Dispatch the scheduler's choice, switching contexts if it differs
    /// from the running thread. Consumes the lock guard: the switch happens
    /// with the lock released but interrupts still disabled.
    fn schedule(&self, mut sched: MutexGuard<'_, Sched>) {
        let Some((prev, next)) = sched.pick() else {
            return;
        };
        log::trace!("switching {} -> {}", prev, next);
        let prev_ctx = sched.thread(prev).context_ptr();
        let next_ctx = sched.thread(next).context_ptr() as *const _;
        drop(sched);
        unsafe {
            DefaultArch::context_switch(prev_ctx, next_ctx);
        }
        // Back on this thread's stack: free whatever died meanwhile.
        let mut sched = self.sched.lock();
        sched.reclaim(&self.stack_pool);
    }

    // ------------------------------------------------------------------
    // Priorities
    // ------------------------------------------------------------------

    /// Effective priority of the calling thread.
    pub fn get_priority(&self) -> u8 {
        self.with_current(|t| t.priority())
    }

    /// Set the calling thread's base priority, yielding if it no longer
    /// outranks the ready-queue head. Ignored under MLFQS.
    pub fn set_priority(&self, priority: u8) {
        assert!(priority <= PRI_MAX, "priority out of range");
        if self.mlfqs() {
            return;
        }
        let demoted = {
            let _guard = IntrGuard::new();
            let mut sched = self.sched.lock();
            let cur = sched.running();
            sched.thread_mut(cur).own_priority = priority;
            sched.recompute_effective(cur);
            sched.preempt_pending()
        };
        if demoted {
            self.yield_now();
        }
    }

    // ------------------------------------------------------------------
    // MLFQS surface
    // ------------------------------------------------------------------

    /// Niceness of the calling thread.
    pub fn nice(&self) -> i8 {
        self.with_current(|t| t.nice())
    }

    /// Set the calling thread's niceness, recomputing its priority and
    /// yielding if it no longer outranks the ready-queue head.
    pub fn set_nice(&self, nice: i8) {
        let nice = nice.clamp(NICE_MIN, NICE_MAX);
        let demoted = {
            let _guard = IntrGuard::new();
            let mut sched = self.sched.lock();
            let cur = sched.running();
            sched.thread_mut(cur).nice = nice;
            if self.mlfqs() {
                let recent_cpu = sched.thread(cur).recent_cpu;
                let computed = Sched::mlfqs_priority_for(recent_cpu, nice);
                let t = sched.thread_mut(cur);
                t.own_priority = computed;
                t.priority = computed;
            }
            sched.preempt_pending()
        };
        if demoted {
            self.yield_now();
        }
    }

    /// 100 times the system load average, rounded to the nearest integer.
    pub fn load_avg_x100(&self) -> i32 {
        let _guard = IntrGuard::new();
        let sched = self.sched.lock();
        sched.load_avg_x100()
    }

    /// 100 times the calling thread's recent CPU, rounded to the nearest
    /// integer.
    pub fn recent_cpu_x100(&self) -> i32 {
        self.with_current(|t| t.recent_cpu.mul_int(100).round())
    }

    // ------------------------------------------------------------------
    // Accounting
    // ------------------------------------------------------------------

    pub fn stats(&self) -> KernelStats {
        let _guard = IntrGuard::new();
        let sched = self.sched.lock();
        KernelStats {
            total: sched.threads.len(),
            ready: sched.count_state(ThreadState::Ready),
            blocked: sched.count_state(ThreadState::Blocked),
            idle_ticks: sched.idle_ticks,
            kernel_ticks: sched.kernel_ticks,
        }
    }

    fn allocate_tid(&self) -> Tid {
        Tid::new(self.next_tid.fetch_add(1, Ordering::AcqRel))
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// First frame of every spawned thread: enable interrupts, run the entry
/// closure, exit.
fn trampoline<F>(closure: usize)
where
    F: FnOnce() + Send + 'static,
{
    DefaultArch::enable_interrupts();
    let f = unsafe { Box::from_raw(closure as *mut F) };
    f();
    kernel().exit();
}

/// Body of the idle thread: park until the next interrupt, forever.
fn idle_entry(_arg: usize) {
    loop {
        DefaultArch::wait_for_interrupt();
    }
}
