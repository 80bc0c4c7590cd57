//! # Kernel
//!
//! Top-level kernel initialization and public API on top of the
//! scheduler core. The kernel owns the single global [`Scheduler`]
//! instance, wraps every entry point in a critical section, and turns
//! the core's block/retry outcomes into the actual context switches
//! (PendSV) that suspend and resume tasks.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init(policy)       ← Reset kernel state
//!         ├─► kernel::create_queue()     ← Communication channels
//!         ├─► kernel::create_periodic()  ← Register tasks (×N)
//!         └─► kernel::start()            ← Launch scheduler (no return)
//!               ├─► Create the idle task (failure here is fatal)
//!               ├─► Configure SysTick + interrupt priorities
//!               └─► Start first task via arch::start_first_task()
//! ```
//!
//! ## Blocking protocol
//!
//! Queue operations follow an attempt/park/retry cycle: the scheduler
//! core either completes the operation or parks the caller on a FIFO
//! wait list, and this layer pends a context switch and re-attempts
//! when the task is next resumed. Timeouts are absolute ticks computed
//! once per call, so retries never extend the wait budget.

use crate::arch::cortex_m4;
use crate::config::TASK_NAME_LEN;
use crate::error::KernelError;
use crate::hooks::{OverrunHook, TickHook};
use crate::policy::SchedPolicy;
use crate::queue::Message;
use crate::scheduler::{DelayOutcome, ReceiveAttempt, Scheduler, SendAttempt};
use crate::sync;
use crate::task::{TaskConfig, TaskEntry, TaskName};
use crate::time::TickType;

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

/// Global scheduler instance.
///
/// # Safety
/// Accessed via `SCHEDULER_PTR`, which is set during `init()`. All
/// access is through critical sections or from ISR context (where
/// interrupts are already serialized by priority).
static mut SCHEDULER: Scheduler = Scheduler::new(SchedPolicy::FixedPriority);

/// Raw pointer to the global scheduler. Used by the arch layer (PendSV,
/// SysTick handlers), which cannot easily use references.
///
/// # Safety
/// Set once during `init()`, read from ISR context.
#[no_mangle]
pub static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the kernel with the given dispatch policy.
///
/// Must be called exactly once, from the main thread, before any other
/// kernel function.
pub fn init(policy: SchedPolicy) {
    unsafe {
        SCHEDULER = Scheduler::new(policy);
        SCHEDULER_PTR = core::ptr::addr_of_mut!(SCHEDULER);
    }
}

/// Create a periodic task.
///
/// The task becomes Ready immediately, released at the current tick;
/// its first deadline is one period out. `priority` matters only under
/// the fixed-priority policy. A `period` of 0 creates an aperiodic
/// (deadline-less) task.
///
/// # Returns
/// - `Ok(task_id)` — the task's slot in the registry
/// - `Err(KernelError::OutOfResources)` — the TCB pool is exhausted
pub fn create_periodic(
    entry: TaskEntry,
    name: &str,
    parameter: *mut (),
    priority: u8,
    period: TickType,
) -> Result<usize, KernelError> {
    debug_assert!(name.len() <= TASK_NAME_LEN);
    let config = TaskConfig {
        name: TaskName::new(name),
        priority,
        period,
    };
    sync::critical_section(|| unsafe {
        (*SCHEDULER_PTR).create_task(config, Some(entry), parameter)
    })
}

/// Delete a task and free its registry slot.
///
/// A task may delete itself; the pended context switch then takes
/// effect as soon as the critical section ends, and control never
/// returns to the deleted task.
pub fn delete_task(id: usize) -> Result<(), KernelError> {
    let deleted_self = sync::critical_section(|| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        let own = scheduler.current_task == Some(id);
        scheduler.delete_task(id).map(|()| own)
    })?;
    cortex_m4::trigger_pendsv();
    if deleted_self {
        // Nothing left to return to; wait for the switch.
        loop {
            cortex_m::asm::wfi();
        }
    }
    Ok(())
}

/// Create a message queue of the given capacity.
pub fn create_queue(capacity: usize) -> Result<usize, KernelError> {
    sync::critical_section(|| unsafe { (*SCHEDULER_PTR).create_queue(capacity) })
}

/// Current tick count.
pub fn get_tick_count() -> TickType {
    sync::critical_section(|| unsafe { (*SCHEDULER_PTR).get_tick_count() })
}

/// Attach a diagnostic tag to the calling task.
pub fn set_task_tag(tag: u32) {
    sync::critical_section(|| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        if let Some(cur) = scheduler.current_task {
            let _ = scheduler.set_tag(cur, tag);
        }
    });
}

/// Read a task's diagnostic tag.
pub fn get_task_tag(id: usize) -> Result<u32, KernelError> {
    sync::critical_section(|| unsafe { (*SCHEDULER_PTR).get_tag(id) })
}

/// Register the per-tick application hook. Runs in interrupt context:
/// bounded time, no blocking.
pub fn set_tick_hook(hook: TickHook) {
    sync::critical_section(|| unsafe {
        (*SCHEDULER_PTR).hooks.tick = Some(hook);
    });
}

/// Register the deadline-overrun observer.
pub fn set_overrun_hook(hook: OverrunHook) {
    sync::critical_section(|| unsafe {
        (*SCHEDULER_PTR).hooks.overrun = Some(hook);
    });
}

/// Block the calling task until `*last_wake + period`, then advance
/// `*last_wake` to that target — drift-free periodic release.
///
/// Returns [`DelayOutcome::Overrun`] when the previous instance outran
/// its period; the task continues immediately in that case.
pub fn delay_until(last_wake: &mut TickType, period: TickType) -> DelayOutcome {
    let (outcome, reschedule) = sync::critical_section(|| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        let cur = scheduler
            .current_task
            .expect("delay_until outside task context");
        let outcome = scheduler.delay_until(cur, last_wake, period);
        (outcome, scheduler.needs_reschedule)
    });
    // Every outcome can demand a new dispatch decision: Blocked parks
    // the caller, while Released/Overrun start a fresh instance whose
    // deadline may now rank behind another Ready task's.
    if reschedule {
        cortex_m4::trigger_pendsv();
        // On Blocked, execution resumes here once the delay target is
        // reached and this task is dispatched again.
    }
    outcome
}

/// Screen an application-supplied queue id and compute the absolute
/// wait deadline in one critical section. The scheduler core treats a
/// bad queue id as internal corruption, so it must never see one from
/// the application surface.
fn queue_deadline(queue: usize, timeout: TickType) -> Result<TickType, KernelError> {
    sync::critical_section(|| unsafe {
        let scheduler = &*SCHEDULER_PTR;
        if !scheduler.queue_exists(queue) {
            return Err(KernelError::InvalidQueue);
        }
        Ok(scheduler.get_tick_count().wrapping_add(timeout))
    })
}

/// Send a message to the back of a queue, waiting up to `timeout`
/// ticks for space.
///
/// The message is stored by copy. If the queue is full the caller is
/// parked FIFO behind earlier blocked senders and retried as slots
/// free; `Err(TimedOut)` is returned once the budget elapses without
/// the message being accepted. A queue id that was never returned by
/// [`create_queue`] fails with `InvalidQueue`.
pub fn send_to_back(queue: usize, msg: &Message, timeout: TickType) -> Result<(), KernelError> {
    let timeout_at = Some(queue_deadline(queue, timeout)?);
    loop {
        let attempt = sync::critical_section(|| unsafe {
            let scheduler = &mut *SCHEDULER_PTR;
            let cur = scheduler
                .current_task
                .expect("send_to_back outside task context");
            scheduler.queue_send(cur, queue, msg, timeout_at)
        });
        match attempt {
            SendAttempt::Enqueued => return Ok(()),
            SendAttempt::TimedOut => return Err(KernelError::TimedOut),
            SendAttempt::Blocked => {
                cortex_m4::trigger_pendsv();
                // Resumed: either space freed (retry) or the timeout
                // fired (the retry reports it).
            }
        }
    }
}

/// Receive the oldest message from a queue, waiting up to `timeout`
/// ticks for one to arrive. A queue id that was never returned by
/// [`create_queue`] fails with `InvalidQueue`.
pub fn receive(queue: usize, timeout: TickType) -> Result<Message, KernelError> {
    let timeout_at = Some(queue_deadline(queue, timeout)?);
    loop {
        let attempt = sync::critical_section(|| unsafe {
            let scheduler = &mut *SCHEDULER_PTR;
            let cur = scheduler
                .current_task
                .expect("receive outside task context");
            scheduler.queue_receive(cur, queue, timeout_at)
        });
        match attempt {
            ReceiveAttempt::Received(msg) => return Ok(msg),
            ReceiveAttempt::TimedOut => return Err(KernelError::TimedOut),
            ReceiveAttempt::Blocked => {
                cortex_m4::trigger_pendsv();
            }
        }
    }
}

/// Start the scheduler. **Does not return.**
///
/// Creates the idle task, configures the SysTick timer and interrupt
/// priorities, and launches the first task. After this call the system
/// is fully preemptive.
///
/// Failure to create the idle task is an unrecoverable resource
/// exhaustion: the system halts rather than run without a dispatch
/// fallback.
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    let first_sp = sync::critical_section(|| unsafe {
        let scheduler = &mut *SCHEDULER_PTR;
        if scheduler.create_idle_task(Some(idle_entry)).is_err() {
            // No idle task means no dispatch guarantee. Fatal.
            loop {
                cortex_m::asm::wfi();
            }
        }
        let first = scheduler.schedule();
        scheduler.tasks[first].stack_pointer as *const u32
    });

    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities();

    unsafe {
        cortex_m4::start_first_task(first_sp);
    }
}

/// The idle activity: never blocks, does no useful work. Dispatched
/// only when nothing else is Ready.
extern "C" fn idle_entry(_param: *mut ()) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
