//! # Scheduling Policy
//!
//! Dispatch-ordering logic for the two supported policies. The scheduler
//! core asks one question — "of these two Ready tasks, which runs
//! first?" — and everything policy-specific lives here as pure functions
//! over TCBs, so the ordering rules are testable in isolation.
//!
//! ## Fixed priority
//!
//! Numerically highest priority wins. Equal priorities round-robin: the
//! task dispatched least recently wins the tie, so equal-priority
//! periodic tasks share the CPU fairly instead of the lowest slot
//! starving the rest.
//!
//! ## Earliest Deadline First
//!
//! Smallest absolute deadline wins, where an instance's deadline is its
//! next release (`release + period`). Ties break by earliest release
//! tick, then by creation order — dispatch is fully deterministic and a
//! given task set always replays the same schedule.
//!
//! All tick comparisons are wrapping-relative to `now` (see
//! [`crate::time`]), so ordering stays correct across counter wrap.

use core::cmp::Ordering;

use crate::task::TaskControlBlock;
use crate::time::TickType;

/// Which dispatch rule the scheduler applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Preemptive fixed-priority with round-robin among equals.
    FixedPriority,
    /// Preemptive EDF over periodic tasks. Aperiodic tasks (period 0)
    /// have no deadline and rank below every periodic task, ordered
    /// among themselves by base priority.
    EarliestDeadline,
}

/// Compare two Ready tasks under `policy` at time `now`.
///
/// `Ordering::Less` means `a` is dispatched before `b`. The ordering is
/// total and antisymmetric for distinct live tasks: every comparison
/// bottoms out in the slot index or creation sequence, which are unique.
pub fn compare(
    policy: SchedPolicy,
    a: &TaskControlBlock,
    b: &TaskControlBlock,
    now: TickType,
) -> Ordering {
    // The idle task loses to everything.
    match (a.is_idle, b.is_idle) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    match policy {
        SchedPolicy::FixedPriority => compare_fixed_priority(a, b),
        SchedPolicy::EarliestDeadline => compare_edf(a, b, now),
    }
}

fn compare_fixed_priority(a: &TaskControlBlock, b: &TaskControlBlock) -> Ordering {
    // Higher numeric priority dispatches first.
    b.config
        .priority
        .cmp(&a.config.priority)
        // Round-robin: least recently dispatched first. Wrapping-safe
        // because both stamps are within one counter half-range of now.
        .then_with(|| rel(a.last_dispatched, b.last_dispatched))
        .then_with(|| a.id.cmp(&b.id))
}

fn compare_edf(a: &TaskControlBlock, b: &TaskControlBlock, now: TickType) -> Ordering {
    match (a.has_deadline(), b.has_deadline()) {
        (true, true) => signed_distance(now, a.absolute_deadline)
            .cmp(&signed_distance(now, b.absolute_deadline))
            .then_with(|| signed_distance(now, a.last_release).cmp(&signed_distance(now, b.last_release)))
            .then_with(|| a.seq.cmp(&b.seq)),
        // Deadline-less tasks run only when no periodic task is Ready.
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_fixed_priority(a, b),
    }
}

/// Wrapping comparison: `Less` when `a` is before `b`.
#[inline]
fn rel(a: TickType, b: TickType) -> Ordering {
    (a.wrapping_sub(b) as i32).cmp(&0)
}

/// Signed ticks from `now` to `t`; negative when `t` is already past.
/// An overdue deadline therefore sorts as the most urgent.
#[inline]
fn signed_distance(now: TickType, t: TickType) -> i32 {
    t.wrapping_sub(now) as i32
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskConfig, TaskName};

    fn task(id: usize, priority: u8, period: TickType, seq: u32, now: TickType) -> TaskControlBlock {
        let mut tcb = TaskControlBlock::empty();
        tcb.init(
            id,
            TaskConfig {
                name: TaskName::new("t"),
                priority,
                period,
            },
            seq,
            now,
        );
        tcb
    }

    #[test]
    fn test_fixed_priority_highest_wins() {
        let lo = task(0, 1, 0, 0, 0);
        let hi = task(1, 5, 0, 1, 0);
        assert_eq!(compare(SchedPolicy::FixedPriority, &hi, &lo, 0), Ordering::Less);
        assert_eq!(compare(SchedPolicy::FixedPriority, &lo, &hi, 0), Ordering::Greater);
    }

    #[test]
    fn test_fixed_priority_round_robin_tie() {
        let mut a = task(0, 3, 0, 0, 0);
        let mut b = task(1, 3, 0, 1, 0);
        a.last_dispatched = 100;
        b.last_dispatched = 90;
        // b ran longer ago, so b goes first.
        assert_eq!(compare(SchedPolicy::FixedPriority, &b, &a, 100), Ordering::Less);
        assert_eq!(compare(SchedPolicy::FixedPriority, &a, &b, 100), Ordering::Greater);
    }

    #[test]
    fn test_edf_earliest_deadline_wins() {
        let mut a = task(0, 0, 100, 0, 0);
        let mut b = task(1, 0, 100, 1, 0);
        a.release(0); // deadline 100
        b.release(20); // deadline 120
        assert_eq!(compare(SchedPolicy::EarliestDeadline, &a, &b, 30), Ordering::Less);
    }

    #[test]
    fn test_edf_priority_field_ignored() {
        let mut urgent = task(0, 0, 50, 0, 0);
        let mut lax = task(1, 200, 500, 1, 0);
        urgent.release(0);
        lax.release(0);
        assert_eq!(
            compare(SchedPolicy::EarliestDeadline, &urgent, &lax, 10),
            Ordering::Less
        );
    }

    #[test]
    fn test_edf_tie_break_release_then_seq() {
        // Same absolute deadline, different release ticks.
        let mut a = task(0, 0, 100, 5, 0);
        let mut b = task(1, 0, 50, 6, 0);
        a.release(0); // deadline 100, released at 0
        b.release(50); // deadline 100, released at 50
        assert_eq!(compare(SchedPolicy::EarliestDeadline, &a, &b, 60), Ordering::Less);

        // Same deadline and release: creation order decides.
        let mut c = task(2, 0, 100, 1, 0);
        let mut d = task(3, 0, 100, 2, 0);
        c.release(0);
        d.release(0);
        assert_eq!(compare(SchedPolicy::EarliestDeadline, &c, &d, 10), Ordering::Less);
    }

    #[test]
    fn test_edf_overdue_deadline_most_urgent() {
        let mut late = task(0, 0, 10, 0, 0);
        let mut ok = task(1, 0, 100, 1, 0);
        late.release(0); // deadline 10, already past at now=20
        ok.release(0); // deadline 100
        assert_eq!(compare(SchedPolicy::EarliestDeadline, &late, &ok, 20), Ordering::Less);
    }

    #[test]
    fn test_edf_across_tick_wrap() {
        let now = u32::MAX - 5;
        let mut a = task(0, 0, 20, 0, 0);
        let mut b = task(1, 0, 40, 1, 0);
        a.release(now); // deadline wraps to 14
        b.release(now); // deadline wraps to 34
        assert_eq!(compare(SchedPolicy::EarliestDeadline, &a, &b, now), Ordering::Less);
    }

    #[test]
    fn test_aperiodic_ranks_below_periodic_under_edf() {
        let mut periodic = task(0, 0, 1000, 0, 0);
        periodic.release(0);
        let aperiodic = task(1, 255, 0, 1, 0);
        assert_eq!(
            compare(SchedPolicy::EarliestDeadline, &periodic, &aperiodic, 5),
            Ordering::Less
        );
    }

    #[test]
    fn test_idle_always_last() {
        let mut idle = task(0, 0, 0, 0, 0);
        idle.is_idle = true;
        let worst = task(1, 0, 0, 1, 0);
        for policy in [SchedPolicy::FixedPriority, SchedPolicy::EarliestDeadline] {
            assert_eq!(compare(policy, &worst, &idle, 0), Ordering::Less);
            assert_eq!(compare(policy, &idle, &worst, 0), Ordering::Greater);
        }
    }
}
