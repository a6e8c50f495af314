//! The scheduler state machine.
//!
//! [`Sched`] owns the thread table, the ready queue, the sleep queue, the
//! lock-holder map used for priority donation, and the MLFQS statistics.
//! It decides; [`crate::kernel::Kernel`] acts: every method here assumes
//! interrupts are disabled and the caller holds the one scheduler lock.
//!
//! The ready queue and every wait list are ordered by effective priority,
//! descending, FIFO within a priority. The sleep queue is ordered by wake
//! tick, ascending. A thread id appears in at most one of them at a time;
//! which one is implied by its [`ThreadState`].

pub mod fixed;
pub mod mlfqs;
pub(crate) mod queue;

use crate::mem::StackPool;
use crate::sync::LockId;
use crate::thread::{Thread, ThreadState, Tid, PRI_MIN};
use crate::time::TIME_SLICE;

use fixed::Fixed;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

/// Donation chains are walked at most this deep.
pub const DONATION_DEPTH_MAX: usize = 8;

/// Scheduler state. One instance lives inside the kernel's lock.
pub(crate) struct Sched {
    /// All live descriptors, including Dying ones awaiting reclamation
    pub(crate) threads: Vec<Thread>,
    /// Ready queue: effective priority descending, FIFO ties
    pub(crate) ready: VecDeque<Tid>,
    /// Sleep queue: wake tick ascending
    pub(crate) sleepers: VecDeque<Tid>,
    /// Which thread holds which lock; consulted by donation chain walks
    pub(crate) lock_holders: BTreeMap<LockId, Tid>,
    pub(crate) current: Option<Tid>,
    pub(crate) idle: Option<Tid>,
    pub(crate) load_avg: Fixed,
    /// Ticks spent in the idle thread
    pub(crate) idle_ticks: i64,
    /// Ticks spent in kernel threads
    pub(crate) kernel_ticks: i64,
}

impl Sched {
    pub(crate) const fn new() -> Sched {
        Sched {
            threads: Vec::new(),
            ready: VecDeque::new(),
            sleepers: VecDeque::new(),
            lock_holders: BTreeMap::new(),
            current: None,
            idle: None,
            load_avg: Fixed::ZERO,
            idle_ticks: 0,
            kernel_ticks: 0,
        }
    }

    // ------------------------------------------------------------------
    // Thread table
    // ------------------------------------------------------------------

    pub(crate) fn try_thread(&self, tid: Tid) -> Option<&Thread> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    pub(crate) fn thread(&self, tid: Tid) -> &Thread {
        self.try_thread(tid).expect("unknown thread id")
    }

    pub(crate) fn thread_mut(&mut self, tid: Tid) -> &mut Thread {
        self.threads
            .iter_mut()
            .find(|t| t.tid == tid)
            .expect("unknown thread id")
    }

    /// The running thread. Fatal before `init`.
    pub(crate) fn running(&self) -> Tid {
        self.current.expect("no running thread: scheduler not initialized")
    }

    pub(crate) fn effective(&self, tid: Tid) -> u8 {
        self.thread(tid).priority
    }

    pub(crate) fn register(&mut self, thread: Thread) {
        debug_assert!(self.try_thread(thread.tid).is_none());
        self.threads.push(thread);
    }

    /// Free every Dying descriptor except the running one, returning stacks
    /// to the pool. Runs after a context switch completes, so a thread never
    /// frees the stack it is executing on.
    pub(crate) fn reclaim(&mut self, pool: &StackPool) {
        let current = self.current;
        let mut at = 0;
        while at < self.threads.len() {
            let dying = self.threads[at].state == ThreadState::Dying
                && Some(self.threads[at].tid) != current;
            if dying {
                let mut dead = self.threads.swap_remove(at);
                log::trace!("reclaiming thread {}", dead.tid);
                if let Some(stack) = dead.stack.take() {
                    pool.deallocate(stack);
                }
            } else {
                at += 1;
            }
        }
    }

    // ------------------------------------------------------------------
    // Ready queue
    // ------------------------------------------------------------------

    /// Transition `tid` to Ready and enqueue it in priority position.
    pub(crate) fn insert_ready(&mut self, tid: Tid) {
        self.thread_mut(tid).state = ThreadState::Ready;
        let mut q = core::mem::take(&mut self.ready);
        queue::insert_by_priority(&mut q, tid, |t| self.effective(t));
        self.ready = q;
        debug_assert!(queue::is_sorted_by_priority(&self.ready, |t| self.effective(t)));
    }

    /// Restore ready-queue order after effective priorities changed.
    pub(crate) fn resort_ready(&mut self) {
        let mut q = core::mem::take(&mut self.ready);
        queue::sort_by_priority(&mut q, |t| self.effective(t));
        self.ready = q;
    }

    /// Requeue the running thread ahead of a dispatch: the idle thread goes
    /// back to Blocked (it is never on the ready queue), everything else
    /// re-enters the queue at its priority position.
    pub(crate) fn prepare_requeue_current(&mut self) {
        let cur = self.running();
        if Some(cur) == self.idle {
            self.thread_mut(cur).state = ThreadState::Blocked;
        } else {
            self.insert_ready(cur);
        }
    }

    /// Select the next thread to run and make it current.
    ///
    /// The caller must already have settled the running thread's state
    /// (requeued, blocked, or dying). Returns the `(previous, next)` pair
    /// whose contexts must be switched, or `None` when the running thread
    /// stays on the CPU.
    pub(crate) fn pick(&mut self) -> Option<(Tid, Tid)> {
        let prev = self.running();
        let next = match self.ready.pop_front() {
            Some(t) => t,
            None => self.idle.expect("nothing to run: scheduler not started"),
        };
        if next == prev {
            self.thread_mut(prev).state = ThreadState::Running;
            return None;
        }
        {
            let t = self.thread_mut(next);
            t.state = ThreadState::Running;
            t.slice_ticks = 0;
        }
        self.current = Some(next);
        Some((prev, next))
    }

    /// Whether the running thread must give way to the ready-queue head.
    pub(crate) fn preempt_pending(&self) -> bool {
        let cur = self.running();
        match self.ready.front() {
            Some(&head) => {
                Some(cur) == self.idle || self.effective(head) > self.effective(cur)
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Sleep queue
    // ------------------------------------------------------------------

    /// Put `tid` to sleep until `wake`, ordered ascending by wake tick.
    pub(crate) fn enqueue_sleeper(&mut self, tid: Tid, wake: i64) {
        {
            let t = self.thread_mut(tid);
            t.wakeup = wake;
            t.state = ThreadState::Blocked;
        }
        let mut q = core::mem::take(&mut self.sleepers);
        queue::insert_by_wakeup(&mut q, tid, |t| self.thread(t).wakeup);
        self.sleepers = q;
    }

    /// Wake every sleeper whose deadline has passed. Work per tick is
    /// bounded by the number of expired sleepers.
    pub(crate) fn wake_sleepers(&mut self, now: i64) -> usize {
        let mut woken = 0;
        while let Some(&head) = self.sleepers.front() {
            if self.thread(head).wakeup > now {
                break;
            }
            self.sleepers.pop_front();
            self.insert_ready(head);
            woken += 1;
        }
        woken
    }

    // ------------------------------------------------------------------
    // Priority donation
    // ------------------------------------------------------------------

    /// Re-derive `tid`'s effective priority from its base priority and
    /// donators, resorting the ready queue if the thread sits in it.
    pub(crate) fn recompute_effective(&mut self, tid: Tid) {
        let own = self.thread(tid).own_priority;
        let best_donor = self
            .thread(tid)
            .donators
            .iter()
            .map(|&d| self.effective(d))
            .max()
            .unwrap_or(PRI_MIN);
        let effective = own.max(best_donor);
        if self.thread(tid).priority != effective {
            self.thread_mut(tid).priority = effective;
            if self.thread(tid).state == ThreadState::Ready {
                self.resort_ready();
            }
        }
    }

    /// Record that `donor` is about to block on `lock` and propagate its
    /// priority along the holder chain.
    ///
    /// No-op when the lock is unheld (the donor will acquire it without
    /// blocking) or when the chain is deeper than [`DONATION_DEPTH_MAX`].
    pub(crate) fn donate(&mut self, donor: Tid, lock: LockId) {
        let holder = match self.lock_holders.get(&lock) {
            Some(&h) => h,
            None => return,
        };
        self.thread_mut(donor).waiting_on = Some(lock);

        // Enlist the donor in priority position; FIFO among equals.
        let donated = self.effective(donor);
        let at = {
            let list = &self.thread(holder).donators;
            let mut at = 0;
            while at < list.len() && self.effective(list[at]) >= donated {
                at += 1;
            }
            at
        };
        self.thread_mut(holder).donators.insert(at, donor);
        log::trace!("thread {} donates {} to thread {}", donor, donated, holder);

        // Walk holder -> holder's blocker -> ... raising priorities. Wait
        // lists are resorted lazily at wakeup, so only the ready queue needs
        // fixing here.
        let mut link = holder;
        for _ in 0..DONATION_DEPTH_MAX {
            if self.effective(link) >= donated {
                break;
            }
            self.thread_mut(link).priority = donated;
            if self.thread(link).state == ThreadState::Ready {
                self.resort_ready();
            }
            match self
                .thread(link)
                .waiting_on
                .and_then(|l| self.lock_holders.get(&l).copied())
            {
                Some(next) => link = next,
                None => break,
            }
        }
    }

    /// Undo the donations `holder` received through `lock` and re-derive its
    /// effective priority from what remains.
    pub(crate) fn withdraw_donations(&mut self, holder: Tid, lock: LockId) {
        let remaining: Vec<Tid> = self
            .thread(holder)
            .donators
            .iter()
            .copied()
            .filter(|&d| self.thread(d).waiting_on != Some(lock))
            .collect();
        self.thread_mut(holder).donators = remaining;
        self.recompute_effective(holder);
    }

    // ------------------------------------------------------------------
    // Wait lists
    // ------------------------------------------------------------------

    /// Remove the best waiter from a wait list.
    ///
    /// The list is kept priority-ordered on insertion, but priorities may
    /// have changed while threads sat in it, so it is resorted (stably,
    /// preserving FIFO ties) before the head is taken.
    pub(crate) fn pick_waiter(&self, waiters: &mut Vec<Tid>) -> Option<Tid> {
        if waiters.is_empty() {
            return None;
        }
        waiters.sort_by(|&a, &b| self.effective(b).cmp(&self.effective(a)));
        Some(waiters.remove(0))
    }

    /// Position at which `tid` enters a priority-ordered wait list.
    pub(crate) fn waiter_position(&self, waiters: &[Tid], tid: Tid) -> usize {
        let new = self.effective(tid);
        let mut at = 0;
        while at < waiters.len() && self.effective(waiters[at]) >= new {
            at += 1;
        }
        at
    }

    // ------------------------------------------------------------------
    // Per-tick work
    // ------------------------------------------------------------------

    /// Bookkeeping run once per timer interrupt, with `now` the tick count
    /// after incrementing. Returns `true` when the interrupt-exit path must
    /// yield: the time slice is consumed or a higher-priority thread waits
    /// at the head of the ready queue.
    pub(crate) fn tick(&mut self, now: i64, mlfqs: bool) -> bool {
        let cur = self.running();
        if Some(cur) == self.idle {
            self.idle_ticks += 1;
        } else {
            self.kernel_ticks += 1;
        }

        self.wake_sleepers(now);

        if mlfqs {
            self.mlfqs_bump_recent_cpu();
            if now % crate::time::TIMER_FREQ as i64 == 0 {
                self.mlfqs_update_load_avg();
                self.mlfqs_decay_recent_cpu();
            }
            if now % mlfqs::PRIORITY_RECALC_INTERVAL == 0 {
                self.mlfqs_recompute_priorities();
            }
        }

        let slice_expired = {
            let t = self.thread_mut(cur);
            t.slice_ticks += 1;
            t.slice_ticks >= TIME_SLICE
        };
        slice_expired || self.preempt_pending()
    }

    // ------------------------------------------------------------------
    // Accounting
    // ------------------------------------------------------------------

    pub(crate) fn count_state(&self, state: ThreadState) -> usize {
        self.threads.iter().filter(|t| t.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{PRI_DEFAULT, PRI_MAX};

    /// Build a scheduler with one descriptor per `(name, priority)`; the
    /// first entry is the running thread, the rest start Ready.
    fn boot(threads: &[(&str, u8)]) -> Sched {
        let mut sched = Sched::new();
        for (n, (name, priority)) in threads.iter().enumerate() {
            let tid = Tid::new(n as u64 + 1);
            let thread = Thread::new(tid, name, *priority, None);
            sched.register(thread);
            if n == 0 {
                sched.thread_mut(tid).state = ThreadState::Running;
                sched.current = Some(tid);
            } else {
                sched.insert_ready(tid);
            }
        }
        sched
    }

    fn tid(n: u64) -> Tid {
        Tid::new(n)
    }

    #[test]
    fn ready_queue_is_priority_ordered() {
        let sched = boot(&[("main", 31), ("low", 10), ("high", 50), ("mid", 31)]);
        let order: Vec<u64> = sched.ready.iter().map(|t| t.get()).collect();
        // high(3) first, then the two 31s... but main is running; mid arrived
        // after low despite equal insertion order by priority
        assert_eq!(order, [3, 4, 2]);
    }

    #[test]
    fn higher_priority_spawn_preempts_creator() {
        let mut sched = boot(&[("a", 31)]);
        sched.register(Thread::new(tid(2), "b", 32, None));
        sched.insert_ready(tid(2));
        assert!(sched.preempt_pending());

        sched.prepare_requeue_current();
        let (prev, next) = sched.pick().expect("must switch");
        assert_eq!(prev, tid(1));
        assert_eq!(next, tid(2));
        assert_eq!(sched.thread(tid(2)).state, ThreadState::Running);
        assert_eq!(sched.thread(tid(1)).state, ThreadState::Ready);
    }

    #[test]
    fn equal_priority_spawn_does_not_preempt() {
        let mut sched = boot(&[("a", 31)]);
        sched.register(Thread::new(tid(2), "b", 31, None));
        sched.insert_ready(tid(2));
        assert!(!sched.preempt_pending());
    }

    #[test]
    fn yield_round_robins_equal_priorities() {
        let mut sched = boot(&[("a", 31), ("b", 31), ("c", 31)]);
        // a yields: goes behind b and c
        sched.prepare_requeue_current();
        let (_, next) = sched.pick().unwrap();
        assert_eq!(next, tid(2));
        sched.prepare_requeue_current();
        let (_, next) = sched.pick().unwrap();
        assert_eq!(next, tid(3));
        sched.prepare_requeue_current();
        let (_, next) = sched.pick().unwrap();
        assert_eq!(next, tid(1));
    }

    #[test]
    fn highest_stays_running_across_yield() {
        let mut sched = boot(&[("high", 50), ("low", 10)]);
        sched.prepare_requeue_current();
        assert!(sched.pick().is_none(), "head of queue is the yielder itself");
        assert_eq!(sched.thread(tid(1)).state, ThreadState::Running);
    }

    #[test]
    fn idle_runs_only_when_queue_empty() {
        let mut sched = boot(&[("main", 31)]);
        let idle = tid(99);
        let mut t = Thread::new(idle, "idle", PRI_MIN, None);
        t.state = ThreadState::Blocked;
        sched.register(t);
        sched.idle = Some(idle);

        // main blocks with nothing else ready: idle is dispatched
        sched.thread_mut(tid(1)).state = ThreadState::Blocked;
        let (_, next) = sched.pick().unwrap();
        assert_eq!(next, idle);

        // a thread becomes ready: idle must give way at the next check
        sched.insert_ready(tid(1));
        assert!(sched.preempt_pending());
        sched.prepare_requeue_current();
        assert_eq!(sched.thread(idle).state, ThreadState::Blocked);
        let (_, next) = sched.pick().unwrap();
        assert_eq!(next, tid(1));
    }

    #[test]
    fn sleepers_wake_in_deadline_order_never_early() {
        let mut sched = boot(&[("main", 31), ("a", 31), ("b", 31), ("c", 31), ("d", 31), ("e", 31)]);
        // pull the five workers off the ready queue and put them to sleep
        for (n, wake) in [(2u64, 10i64), (3, 20), (4, 30), (5, 40), (6, 50)] {
            let t = tid(n);
            sched.ready.retain(|&x| x != t);
            sched.enqueue_sleeper(t, wake);
        }
        assert_eq!(sched.sleepers.len(), 5);

        let mut woken: Vec<(i64, u64)> = Vec::new();
        for now in 1..=55 {
            let before: Vec<Tid> = sched.ready.iter().copied().collect();
            sched.wake_sleepers(now);
            let newly: Vec<Tid> = sched
                .ready
                .iter()
                .copied()
                .filter(|t| !before.contains(t))
                .collect();
            for t in newly {
                assert!(now >= sched.thread(t).wakeup, "woke before deadline");
                woken.push((now, t.get()));
            }
        }
        assert_eq!(woken, [(10, 2), (20, 3), (30, 4), (40, 5), (50, 6)]);
        assert!(sched.sleepers.is_empty());
    }

    #[test]
    fn sleep_queue_pops_only_expired_heads() {
        let mut sched = boot(&[("main", 31), ("a", 31), ("b", 31)]);
        sched.ready.clear();
        sched.enqueue_sleeper(tid(2), 100);
        sched.enqueue_sleeper(tid(3), 5);
        // ascending order regardless of insertion order
        assert_eq!(sched.sleepers.front(), Some(&tid(3)));
        assert_eq!(sched.wake_sleepers(5), 1);
        assert_eq!(sched.wake_sleepers(99), 0);
        assert_eq!(sched.wake_sleepers(100), 1);
    }

    #[test]
    fn donation_raises_holder_and_restores_on_release() {
        let mut sched = boot(&[("low", 10), ("high", 40)]);
        let lock = LockId::fresh();
        sched.lock_holders.insert(lock, tid(1));

        sched.donate(tid(2), lock);
        assert_eq!(sched.effective(tid(1)), 40);
        assert_eq!(sched.thread(tid(1)).base_priority(), 10);
        assert_eq!(sched.thread(tid(2)).waiting_on, Some(lock));

        sched.withdraw_donations(tid(1), lock);
        assert_eq!(sched.effective(tid(1)), 10, "release restores pre-acquire priority");
        assert!(sched.thread(tid(1)).donators.is_empty());
    }

    #[test]
    fn nested_donation_propagates_along_the_chain() {
        // l holds a; m holds b and blocks on a; h blocks on b.
        let mut sched = boot(&[("l", 1), ("m", 2), ("h", 3)]);
        let (l, m, h) = (tid(1), tid(2), tid(3));
        let a = LockId::fresh();
        let b = LockId::fresh();
        sched.lock_holders.insert(a, l);
        sched.lock_holders.insert(b, m);

        sched.donate(m, a);
        assert_eq!(sched.effective(l), 2);

        sched.donate(h, b);
        assert_eq!(sched.effective(m), 3);
        assert_eq!(sched.effective(l), 3, "donation chains through m to l");

        // l releases a: back to base, m keeps h's donation
        sched.withdraw_donations(l, a);
        sched.lock_holders.remove(&a);
        sched.thread_mut(m).waiting_on = None;
        sched.lock_holders.insert(a, m);
        assert_eq!(sched.effective(l), 1);
        assert_eq!(sched.effective(m), 3);

        // m releases b: back to base
        sched.withdraw_donations(m, b);
        sched.lock_holders.remove(&b);
        assert_eq!(sched.effective(m), 2);
    }

    #[test]
    fn donation_chain_depth_is_bounded() {
        // threads 1..=12 where thread n holds lock n and waits on lock n-1
        let mut sched = Sched::new();
        let mut locks = Vec::new();
        for n in 1..=12u64 {
            let mut t = Thread::new(tid(n), "link", 10, None);
            t.state = ThreadState::Blocked;
            sched.register(t);
            let lock = LockId::fresh();
            sched.lock_holders.insert(lock, tid(n));
            locks.push(lock);
        }
        for n in 2..=12u64 {
            sched.thread_mut(tid(n)).waiting_on = Some(locks[n as usize - 2]);
        }
        let mut donor = Thread::new(tid(100), "donor", 60, None);
        donor.state = ThreadState::Running;
        sched.register(donor);
        sched.current = Some(tid(100));

        sched.donate(tid(100), locks[11]);
        // the walk starts at lock 12's holder and stops after 8 links
        assert_eq!(sched.effective(tid(12)), 60);
        assert_eq!(sched.effective(tid(5)), 60);
        assert_eq!(sched.effective(tid(4)), 10);
    }

    #[test]
    fn donators_list_holds_multiple_donors() {
        let mut sched = boot(&[("holder", 5), ("d1", 20), ("d2", 30), ("d3", 25)]);
        let lock = LockId::fresh();
        sched.lock_holders.insert(lock, tid(1));
        sched.donate(tid(2), lock);
        sched.donate(tid(3), lock);
        sched.donate(tid(4), lock);
        assert_eq!(sched.effective(tid(1)), 30);
        // descending order among donators
        let prios: Vec<u8> = sched.thread(tid(1)).donators.iter().map(|&d| sched.effective(d)).collect();
        assert_eq!(prios, [30, 25, 20]);

        sched.withdraw_donations(tid(1), lock);
        assert_eq!(sched.effective(tid(1)), 5);
    }

    #[test]
    fn release_of_one_lock_keeps_other_donations() {
        let mut sched = boot(&[("holder", 5), ("d1", 20), ("d2", 30)]);
        let la = LockId::fresh();
        let lb = LockId::fresh();
        sched.lock_holders.insert(la, tid(1));
        sched.lock_holders.insert(lb, tid(1));
        sched.donate(tid(2), la);
        sched.donate(tid(3), lb);
        assert_eq!(sched.effective(tid(1)), 30);

        sched.withdraw_donations(tid(1), lb);
        assert_eq!(sched.effective(tid(1)), 20, "la donation still applies");
    }

    #[test]
    fn donation_resorts_ready_holder() {
        let mut sched = boot(&[("main", 40), ("holder", 10), ("other", 20), ("donor", 50)]);
        let lock = LockId::fresh();
        sched.lock_holders.insert(lock, tid(2));
        // holder(10) sits behind other(20) in the ready queue
        assert_eq!(sched.ready.front(), Some(&tid(4)));
        // donor (ready, 50) donates into holder
        sched.ready.retain(|&t| t != tid(4));
        sched.donate(tid(4), lock);
        assert_eq!(sched.effective(tid(2)), 50);
        assert_eq!(sched.ready.front(), Some(&tid(2)), "raised holder moved to queue head");
    }

    #[test]
    fn wait_list_pick_honors_current_priorities() {
        let mut sched = boot(&[("main", PRI_MAX)]);
        let mut waiters = Vec::new();
        for (n, p) in [(2u64, 10u8), (3, 20), (4, 30), (5, 40), (6, 50), (7, 60)] {
            let mut t = Thread::new(tid(n), "w", p, None);
            t.state = ThreadState::Blocked;
            sched.register(t);
            let at = sched.waiter_position(&waiters, tid(n));
            waiters.insert(at, tid(n));
        }
        let mut order = Vec::new();
        while let Some(t) = sched.pick_waiter(&mut waiters) {
            order.push(sched.effective(t));
        }
        assert_eq!(order, [60, 50, 40, 30, 20, 10]);
    }

    #[test]
    fn wait_list_pick_sees_priority_changes_while_queued() {
        let mut sched = boot(&[("main", PRI_MAX)]);
        let mut waiters = Vec::new();
        for (n, p) in [(2u64, 30u8), (3, 20)] {
            let mut t = Thread::new(tid(n), "w", p, None);
            t.state = ThreadState::Blocked;
            sched.register(t);
            let at = sched.waiter_position(&waiters, tid(n));
            waiters.insert(at, tid(n));
        }
        // thread 3 gets donated up past thread 2 while queued
        sched.thread_mut(tid(3)).priority = 60;
        assert_eq!(sched.pick_waiter(&mut waiters), Some(tid(3)));
    }

    #[test]
    fn time_slice_expires_after_four_ticks() {
        let mut sched = boot(&[("main", PRI_DEFAULT)]);
        assert!(!sched.tick(1, false));
        assert!(!sched.tick(2, false));
        assert!(!sched.tick(3, false));
        assert!(sched.tick(4, false), "slice of four ticks consumed");
    }

    #[test]
    fn tick_requests_yield_when_sleeper_outranks_current() {
        let mut sched = boot(&[("main", 20), ("waker", 45)]);
        sched.ready.retain(|&t| t != tid(2));
        sched.enqueue_sleeper(tid(2), 3);
        assert!(!sched.tick(1, false));
        assert!(!sched.tick(2, false));
        assert!(sched.tick(3, false), "woken thread outranks current");
        assert_eq!(sched.thread(tid(2)).state, ThreadState::Ready);
    }

    #[test]
    fn state_accounting_matches_table() {
        let mut sched = boot(&[("main", 31), ("a", 31), ("b", 31)]);
        sched.ready.retain(|&t| t != tid(3));
        sched.enqueue_sleeper(tid(3), 100);
        let total = sched.count_state(ThreadState::Running)
            + sched.count_state(ThreadState::Ready)
            + sched.count_state(ThreadState::Blocked)
            + sched.count_state(ThreadState::Dying);
        assert_eq!(total, sched.threads.len());
        assert_eq!(sched.count_state(ThreadState::Running), 1);
    }

    #[test]
    fn reclaim_frees_dying_threads_but_not_current() {
        let pool = StackPool::new();
        let mut sched = boot(&[("main", 31), ("doomed", 31)]);
        sched.ready.retain(|&t| t != tid(2));
        sched.thread_mut(tid(2)).state = ThreadState::Dying;
        sched.thread_mut(tid(2)).stack = pool.allocate(crate::mem::StackSizeClass::Page);
        sched.reclaim(&pool);
        assert!(sched.try_thread(tid(2)).is_none());
        assert!(sched.try_thread(tid(1)).is_some());
        let (_, deallocated, in_use) = pool.stats();
        assert_eq!(deallocated, 1);
        assert_eq!(in_use, 0);
    }
}
