//! # Task Control Block
//!
//! Defines the task model for Cadence. Each task is a periodic activity:
//! it is released at a fixed interval, runs until it blocks (on
//! `delay_until` or a queue operation) or is preempted, and is expected
//! to finish each instance before its next release.
//!
//! Under EDF the absolute deadline of an instance equals its next release
//! (`release + period`) — the classic implicit-deadline periodic model.

use crate::config::{STACK_SIZE, TASK_NAME_LEN};
use crate::time::TickType;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task in the scheduler's state machine.
///
/// ```text
///   ┌──────────┐      dispatch       ┌─────────┐
///   │  Ready   │ ──────────────────► │ Running │
///   └──────────┘                     └─────────┘
///        ▲                                │
///        │           preempt              │
///        └───────────────────────────────┘
///        │                                │
///        │    wake (timer / resource /    ▼
///        │          timeout)        ┌──────────┐
///        └───────────────────────── │ Blocked  │
///                                   └──────────┘
/// ```
///
/// A live task is in exactly one of Ready, Running, or Blocked at any
/// instant; at most one task is Running. `Suspended` marks unallocated
/// slots, `Terminated` marks a slot freed by deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is ready to run and competing for the CPU.
    Ready,
    /// Task is currently executing.
    Running,
    /// Task is blocked on a delay or a queue wait list.
    Blocked,
    /// Slot is not allocated (never created, or system startup).
    Suspended,
    /// Task was deleted and will not be scheduled again.
    Terminated,
}

// ---------------------------------------------------------------------------
// Blocking bookkeeping
// ---------------------------------------------------------------------------

/// Why a Blocked task is blocked. Owned by the scheduler; cleared on wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Sleeping in `delay_until` until the given absolute tick.
    DelayUntil(TickType),
    /// Waiting on a full queue's send wait list. `timeout_at` is the
    /// absolute tick at which the wait gives up, `None` to wait forever.
    QueueSend {
        queue: usize,
        timeout_at: Option<TickType>,
    },
    /// Waiting on an empty queue's receive wait list.
    QueueReceive {
        queue: usize,
        timeout_at: Option<TickType>,
    },
}

/// Why a Blocked task was made Ready again. Read by the blocking queue
/// protocol after the task is re-dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Not woken from a block (initial state, or running normally).
    None,
    /// A `delay_until` target was reached.
    Timer,
    /// The awaited resource became available (queue slot or message);
    /// the operation should be retried.
    Resource,
    /// The wait budget elapsed; the operation must report `TimedOut`.
    Timeout,
}

// ---------------------------------------------------------------------------
// Task name
// ---------------------------------------------------------------------------

/// Fixed-capacity task name. Longer names are truncated at
/// `TASK_NAME_LEN` bytes.
#[derive(Debug, Clone, Copy)]
pub struct TaskName {
    bytes: [u8; TASK_NAME_LEN],
    len: u8,
}

impl TaskName {
    /// Build a name from a string slice, truncating if needed.
    pub const fn new(s: &str) -> Self {
        let src = s.as_bytes();
        let mut bytes = [0u8; TASK_NAME_LEN];
        let mut i = 0;
        while i < src.len() && i < TASK_NAME_LEN {
            bytes[i] = src[i];
            i += 1;
        }
        Self {
            bytes,
            len: i as u8,
        }
    }

    pub const fn empty() -> Self {
        Self {
            bytes: [0u8; TASK_NAME_LEN],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever constructed from &str prefixes; a char boundary cut
        // degrades to empty rather than invalid UTF-8.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Task configuration (immutable after creation)
// ---------------------------------------------------------------------------

/// Task entry point. Receives the opaque parameter given at creation and
/// never returns.
pub type TaskEntry = extern "C" fn(*mut ()) -> !;

/// Static configuration for a task, set at creation time.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    /// Human-readable identity for diagnostics.
    pub name: TaskName,

    /// Base priority (numerically higher = more important). Used by the
    /// fixed-priority policy; ignored under EDF.
    pub priority: u8,

    /// Release period in ticks. `0` marks an aperiodic task, which has
    /// no deadline and ranks below every periodic task under EDF.
    pub period: TickType,
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block (TCB) — the per-task descriptor.
///
/// TCBs live in a fixed array inside the scheduler — no heap. Each TCB
/// includes an inline stack; `stack_pointer` points into it and is
/// updated on every context switch.
pub struct TaskControlBlock {
    /// Slot index in the scheduler's task array.
    pub id: usize,

    /// Current execution state.
    pub state: TaskState,

    /// Static configuration (name, priority, period).
    pub config: TaskConfig,

    /// Diagnostic identity marker. Read/written only through the tag
    /// API; never consulted by scheduling decisions.
    pub tag: u32,

    /// Tick of the current instance's release.
    pub last_release: TickType,

    /// Absolute deadline of the current instance (`last_release +
    /// period`). Meaningless for aperiodic tasks.
    pub absolute_deadline: TickType,

    /// Creation order, monotonically assigned. Final EDF tie-break so
    /// dispatch is deterministic and reproducible.
    pub seq: u32,

    /// Tick at which this task was last dispatched. Fixed-priority
    /// tie-break: least recently dispatched wins, which round-robins
    /// equal-priority tasks.
    pub last_dispatched: TickType,

    /// Number of deadline overruns recorded for this task (an instance
    /// still running when its next release was due).
    pub overruns: u32,

    /// Why the task is Blocked, if it is.
    pub block: Option<BlockReason>,

    /// Why the task was last woken from a block.
    pub wake_cause: WakeCause,

    /// Entry function and its opaque parameter. `None` for descriptors
    /// driven externally (host-side tests).
    pub entry: Option<TaskEntry>,
    pub parameter: *mut (),

    /// Saved stack pointer (PSP). Updated on context switch. Points
    /// into `self.stack`.
    pub stack_pointer: *mut u32,

    /// Per-task stack memory. Aligned to 8 bytes as required by AAPCS.
    pub stack: TaskStack,

    /// Marks the idle task. The idle task never blocks and is only
    /// dispatched when nothing else is Ready.
    pub is_idle: bool,

    /// Whether this slot is allocated.
    pub active: bool,
}

/// Per-task stack region, 8-byte aligned.
#[repr(align(8))]
pub struct TaskStack(pub [u8; STACK_SIZE]);

// Safety: the raw pointers always refer to the TCB's own stack (or are
// null / caller-provided parameters). TCBs are only touched inside
// critical sections or from ISR context.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An empty (unallocated) TCB. Used to initialize the static array.
    pub const fn empty() -> Self {
        Self {
            id: 0,
            state: TaskState::Suspended,
            config: TaskConfig {
                name: TaskName::empty(),
                priority: 0,
                period: 0,
            },
            tag: 0,
            last_release: 0,
            absolute_deadline: 0,
            seq: 0,
            last_dispatched: 0,
            overruns: 0,
            block: None,
            wake_cause: WakeCause::None,
            entry: None,
            parameter: core::ptr::null_mut(),
            stack_pointer: core::ptr::null_mut(),
            stack: TaskStack([0u8; STACK_SIZE]),
            is_idle: false,
            active: false,
        }
    }

    /// Initialize this slot for a new task, Ready and released at `now`.
    pub fn init(&mut self, id: usize, config: TaskConfig, seq: u32, now: TickType) {
        self.id = id;
        self.state = TaskState::Ready;
        self.config = config;
        self.tag = 0;
        self.seq = seq;
        self.overruns = 0;
        self.block = None;
        self.wake_cause = WakeCause::None;
        self.is_idle = false;
        self.active = true;
        self.last_dispatched = now;
        self.release(now);
    }

    /// Start a new instance released at `tick`: the deadline moves to
    /// `tick + period`.
    pub fn release(&mut self, tick: TickType) {
        self.last_release = tick;
        self.absolute_deadline = tick.wrapping_add(self.config.period);
    }

    /// Record one deadline overrun.
    pub fn record_overrun(&mut self) {
        self.overruns = self.overruns.wrapping_add(1);
    }

    /// Whether this task is competing for the CPU.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.active && self.state == TaskState::Ready
    }

    /// Whether this task has a deadline (periodic, non-idle).
    #[inline]
    pub fn has_deadline(&self) -> bool {
        self.config.period > 0 && !self.is_idle
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, priority: u8, period: TickType) -> TaskConfig {
        TaskConfig {
            name: TaskName::new(name),
            priority,
            period,
        }
    }

    #[test]
    fn test_tcb_initialization() {
        let mut tcb = TaskControlBlock::empty();
        assert!(!tcb.active);
        assert_eq!(tcb.state, TaskState::Suspended);

        tcb.init(2, config("Button_1_Monitor", 1, 50), 7, 100);
        assert!(tcb.active);
        assert_eq!(tcb.state, TaskState::Ready);
        assert_eq!(tcb.id, 2);
        assert_eq!(tcb.seq, 7);
        assert_eq!(tcb.config.name.as_str(), "Button_1_Monitor");
        assert_eq!(tcb.last_release, 100);
        assert_eq!(tcb.absolute_deadline, 150);
        assert!(tcb.has_deadline());
    }

    #[test]
    fn test_name_truncation() {
        let name = TaskName::new("A_Task_Name_That_Is_Far_Too_Long");
        assert_eq!(name.as_str().len(), TASK_NAME_LEN);
        assert_eq!(name.as_str(), "A_Task_Name_That_Is_");
    }

    #[test]
    fn test_release_moves_deadline() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init(0, config("Periodic", 0, 100), 0, 0);
        tcb.release(300);
        assert_eq!(tcb.last_release, 300);
        assert_eq!(tcb.absolute_deadline, 400);
    }

    #[test]
    fn test_release_wraps_deadline() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init(0, config("Wrapper", 0, 50), 0, 0);
        tcb.release(u32::MAX - 10);
        assert_eq!(tcb.absolute_deadline, 39);
    }

    #[test]
    fn test_aperiodic_has_no_deadline() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init(0, config("Load_1_Simulation", 3, 0), 0, 0);
        assert!(!tcb.has_deadline());
    }

    #[test]
    fn test_overrun_recording() {
        let mut tcb = TaskControlBlock::empty();
        tcb.init(0, config("Late", 0, 10), 0, 0);
        tcb.record_overrun();
        tcb.record_overrun();
        assert_eq!(tcb.overruns, 2);
    }
}
