//! Ordered-queue helpers shared by the ready queue, wait lists, and the
//! sleep queue.
//!
//! All orderings break ties FIFO: a newly inserted element lands after every
//! element it compares equal to, and the resort uses a stable sort so
//! insertion order among equals survives priority churn.

use crate::thread::Tid;
use alloc::collections::VecDeque;

/// Insert `tid` into a queue kept in descending priority order.
pub(crate) fn insert_by_priority<F>(queue: &mut VecDeque<Tid>, tid: Tid, priority: F)
where
    F: Fn(Tid) -> u8,
{
    let new = priority(tid);
    let mut at = 0;
    while at < queue.len() && priority(queue[at]) >= new {
        at += 1;
    }
    queue.insert(at, tid);
}

/// Insert `tid` into a queue kept in ascending wake-tick order.
pub(crate) fn insert_by_wakeup<F>(queue: &mut VecDeque<Tid>, tid: Tid, wakeup: F)
where
    F: Fn(Tid) -> i64,
{
    let new = wakeup(tid);
    let mut at = 0;
    while at < queue.len() && wakeup(queue[at]) <= new {
        at += 1;
    }
    queue.insert(at, tid);
}

/// Restore descending priority order after effective priorities changed.
pub(crate) fn sort_by_priority<F>(queue: &mut VecDeque<Tid>, priority: F)
where
    F: Fn(Tid) -> u8,
{
    queue
        .make_contiguous()
        .sort_by(|&a, &b| priority(b).cmp(&priority(a)));
}

/// Whether the queue is in descending priority order.
pub(crate) fn is_sorted_by_priority<F>(queue: &VecDeque<Tid>, priority: F) -> bool
where
    F: Fn(Tid) -> u8,
{
    queue
        .iter()
        .zip(queue.iter().skip(1))
        .all(|(&a, &b)| priority(a) >= priority(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u64) -> Tid {
        Tid::new(n)
    }

    #[test]
    fn priority_insert_keeps_descending_order() {
        // tid doubles as priority for the lookup
        let prio = |t: Tid| t.get() as u8;
        let mut q = VecDeque::new();
        for n in [30, 50, 10, 40, 20] {
            insert_by_priority(&mut q, tid(n), prio);
        }
        let order: alloc::vec::Vec<u64> = q.iter().map(|t| t.get()).collect();
        assert_eq!(order, [50, 40, 30, 20, 10]);
    }

    #[test]
    fn equal_priorities_stay_fifo() {
        let prio = |_: Tid| 31u8;
        let mut q = VecDeque::new();
        for n in 1..=4 {
            insert_by_priority(&mut q, tid(n), prio);
        }
        let order: alloc::vec::Vec<u64> = q.iter().map(|t| t.get()).collect();
        assert_eq!(order, [1, 2, 3, 4]);
    }

    #[test]
    fn wakeup_insert_keeps_ascending_order_with_fifo_ties() {
        let wake = |t: Tid| (t.get() / 10) as i64;
        let mut q = VecDeque::new();
        for n in [30, 11, 20, 12, 31] {
            insert_by_wakeup(&mut q, tid(n), wake);
        }
        let order: alloc::vec::Vec<u64> = q.iter().map(|t| t.get()).collect();
        // wake ticks: 11,12 -> 1; 20 -> 2; 30,31 -> 3; ties keep arrival order
        assert_eq!(order, [11, 12, 20, 30, 31]);
    }

    #[test]
    fn resort_is_stable() {
        let mut q: VecDeque<Tid> = [1u64, 2, 3, 4].into_iter().map(tid).collect();
        // 2 and 4 jump to priority 60, the rest stay at 31
        let prio = |t: Tid| if t.get() % 2 == 0 { 60u8 } else { 31 };
        sort_by_priority(&mut q, prio);
        let order: alloc::vec::Vec<u64> = q.iter().map(|t| t.get()).collect();
        assert_eq!(order, [2, 4, 1, 3]);
        assert!(is_sorted_by_priority(&q, prio));
    }
}
