//! # Application Hook Layer
//!
//! Lightweight instrumentation points the application can attach to the
//! kernel. Hooks observe; they never influence a scheduling decision.
//!
//! - The **tick hook** runs once per tick, after the counter increments
//!   and before dispatch is re-evaluated. It executes in the same
//!   context as the tick interrupt, so it must be short and must not
//!   block — a heartbeat pin toggle is the intended scale of work.
//! - The **overrun hook** fires once per recorded deadline overrun (a
//!   periodic instance still running when its next release was due).
//!   Overruns are a documented policy, not an error: the task is
//!   re-released immediately and keeps running.
//!
//! Task *tags* (a small diagnostic identity value per task) are the
//! third instrumentation surface; they live on the TCB and are accessed
//! through the scheduler's `set_tag`/`get_tag`.

use crate::time::TickType;

/// Per-tick hook. Interrupt context: bounded time, no blocking.
pub type TickHook = fn();

/// Deadline-overrun observer. Receives the overrunning task's id and
/// the tick at which the overrun was detected.
pub type OverrunHook = fn(task: usize, tick: TickType);

/// Hook registrations, owned by the scheduler context — no free-floating
/// globals.
pub struct Hooks {
    pub tick: Option<TickHook>,
    pub overrun: Option<OverrunHook>,
}

impl Hooks {
    pub const fn new() -> Self {
        Self {
            tick: None,
            overrun: None,
        }
    }

    #[inline]
    pub fn run_tick(&self) {
        if let Some(hook) = self.tick {
            hook();
        }
    }

    #[inline]
    pub fn run_overrun(&self, task: usize, tick: TickType) {
        if let Some(hook) = self.overrun {
            hook(task, tick);
        }
    }
}
