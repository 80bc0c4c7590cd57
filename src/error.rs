//! # Error Taxonomy
//!
//! Recoverable kernel errors returned to callers. Deadline overruns are
//! deliberately *not* errors — they are recorded per task and surfaced
//! through the hook layer (see [`crate::hooks`]), because a late periodic
//! instance is a diagnostic condition, not a failure of the call that
//! observed it.
//!
//! Corruption of kernel-internal invariants (e.g., a wait list naming a
//! freed task slot) is fatal and panics: silent continuation after such
//! corruption risks unbounded misbehavior.

/// Recoverable errors returned by kernel APIs.
///
/// Callers decide whether to retry, drop the operation, or escalate —
/// the kernel never swallows these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A creation request exhausted a static pool (TCB slots, queue
    /// slots). Nothing was allocated.
    OutOfResources,
    /// A blocking queue operation exceeded its wait budget. The message
    /// was neither sent nor received.
    TimedOut,
    /// The given task id does not name a live task.
    InvalidTask,
    /// The given queue id does not name a live queue.
    InvalidQueue,
}
