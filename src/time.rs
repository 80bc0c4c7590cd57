//! # Tick Arithmetic
//!
//! The tick counter is a `u32` incremented once per timer interrupt. It
//! wraps, and wrap-around is *defined* behavior: all comparisons between
//! tick values use modular arithmetic, so delays and deadlines keep
//! working across the 2^32 boundary (about 49 days at 1 kHz).
//!
//! The convention is the usual serial-number one: tick `a` is considered
//! to be after tick `b` when the wrapping distance `a - b`, interpreted
//! as a signed value, is positive. This is unambiguous as long as no two
//! live timestamps are more than half the counter range apart, which a
//! real system is nowhere near.

/// Scheduler time, in ticks. Wraps with defined modular semantics.
pub type TickType = u32;

/// Returns `true` if tick `a` is strictly after tick `b` in wrapping
/// order.
#[inline]
pub const fn tick_after(a: TickType, b: TickType) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Returns `true` if tick `deadline` has been reached at time `now`
/// (i.e., `now >= deadline` in wrapping order).
#[inline]
pub const fn tick_reached(now: TickType, deadline: TickType) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Wrapping distance from `from` to `to`. Only meaningful when `to` is
/// not before `from`.
#[inline]
pub const fn ticks_until(from: TickType, to: TickType) -> TickType {
    to.wrapping_sub(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_after_basic() {
        assert!(tick_after(10, 5));
        assert!(!tick_after(5, 10));
        assert!(!tick_after(7, 7));
    }

    #[test]
    fn test_tick_after_across_wrap() {
        // Just past the wrap point: 3 is "after" u32::MAX - 2.
        assert!(tick_after(3, u32::MAX - 2));
        assert!(!tick_after(u32::MAX - 2, 3));
    }

    #[test]
    fn test_tick_reached() {
        assert!(tick_reached(100, 100));
        assert!(tick_reached(101, 100));
        assert!(!tick_reached(99, 100));
        // Deadline just after the wrap: reached once now wraps too.
        let deadline = 5u32;
        assert!(!tick_reached(u32::MAX, deadline));
        assert!(tick_reached(5, deadline));
        assert!(tick_reached(6, deadline));
    }

    #[test]
    fn test_ticks_until_wraps() {
        assert_eq!(ticks_until(u32::MAX - 1, 3), 5);
        assert_eq!(ticks_until(10, 60), 50);
    }
}
