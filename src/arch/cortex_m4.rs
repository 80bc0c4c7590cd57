//! # Cortex-M4 Port
//!
//! Everything that touches ARM Cortex-M4 (Thumb-2) hardware: the
//! SysTick tick source, the PendSV context switch, initial stack frames,
//! and exception priorities.
//!
//! ## How a switch works
//!
//! Tasks run in Thread mode on the process stack (PSP); exception
//! handlers and the startup path use the main stack (MSP). Exception
//! entry hardware-stacks R0–R3, R12, LR, PC, and xPSR onto the PSP;
//! PendSV stacks the remaining R4–R11 by hand, records the PSP in the
//! outgoing TCB, asks the scheduler for the next task, and unwinds the
//! same layers in reverse for the incoming one.
//!
//! SysTick and PendSV both sit at priority 0xFF, the lowest, so the
//! switch never interrupts another handler and any pending ISR runs to
//! completion first. The tick body itself (counter, tick hook,
//! delay/timeout wake-ups) is bounded work and never blocks.

use core::arch::asm;
use cortex_m::peripheral::syst::SystClkSource;

use crate::config::{STACK_SIZE, SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::task::{TaskControlBlock, TaskEntry};

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer to drive the scheduler tick.
///
/// SysTick fires at `TICK_HZ` using the processor clock. Each interrupt
/// runs `SysTick()` below, which advances the kernel's tick state.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Pend a context switch.
///
/// Writes PENDSVSET in the ICSR; the switch itself happens once every
/// higher-priority exception has drained, which is what makes PendSV
/// the safe place for it.
#[inline]
pub fn trigger_pendsv() {
    // ICSR, PENDSVSET = bit 28
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Drop PendSV and SysTick to the lowest interrupt priority.
pub fn set_interrupt_priorities() {
    unsafe {
        // SHPR3: PendSV priority in bits 23:16, SysTick in bits 31:24.
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        let val = val | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(shpr3, val);
    }
}

// ---------------------------------------------------------------------------
// Task stack initialization
// ---------------------------------------------------------------------------

/// Initialize a task's stack frame for its first dispatch.
///
/// The Cortex-M4 hardware automatically pushes an exception frame on
/// interrupt entry. We pre-populate this frame on the task's stack so
/// that the first PendSV "return" starts executing the task function
/// with its opaque parameter in R0.
///
/// ## Stack Layout (top = high address, growing down)
///
/// ```text
/// [Hardware stacked frame]   <- initial PSP points here
///   xPSR  (Thumb bit set)
///   PC    (task entry point)
///   LR    (task_exit)
///   R12   (0)
///   R3    (0)
///   R2    (0)
///   R1    (0)
///   R0    (task parameter)
/// [Software saved context]
///   R11 … R4 (0)             <- stack_pointer after init
/// ```
pub fn init_task_stack(tcb: &mut TaskControlBlock, entry: TaskEntry, parameter: *mut ()) {
    let stack_top = tcb.stack.0.as_ptr() as usize + STACK_SIZE;
    // Align to 8 bytes (AAPCS requirement)
    let aligned_top = stack_top & !0x07;

    // Space for 16 registers (8 HW + 8 SW)
    let frame_ptr = (aligned_top - 16 * 4) as *mut u32;

    unsafe {
        // Software-saved registers (R4–R11) — bottom of frame
        for i in 0..8 {
            *frame_ptr.add(i) = 0;
        }

        // Hardware-stacked frame (R0–R3, R12, LR, PC, xPSR)
        *frame_ptr.add(8) = parameter as u32; // R0 — entry argument
        *frame_ptr.add(9) = 0; // R1
        *frame_ptr.add(10) = 0; // R2
        *frame_ptr.add(11) = 0; // R3
        *frame_ptr.add(12) = 0; // R12
        *frame_ptr.add(13) = task_exit as u32; // LR — if the task returns
        *frame_ptr.add(14) = entry as usize as u32; // PC — entry point
        *frame_ptr.add(15) = 0x0100_0000; // xPSR — Thumb bit set
    }

    tcb.stack_pointer = frame_ptr;
}

/// Fallback for tasks that return (they can't — entry is `fn(..) -> !`).
/// Loops forever to prevent undefined behavior.
extern "C" fn task_exit() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Start the first task by switching to PSP and branching to Thread mode.
///
/// Called once during `kernel::start()`; never returns. Sets up the
/// processor to use PSP for Thread mode and jumps to the first task's
/// entry point via a fake exception return.
///
/// # Safety
/// Must only be called once, with a valid stack pointer produced by
/// [`init_task_stack`].
pub unsafe fn start_first_task(psp: *const u32) -> ! {
    asm!(
        // Point PSP past the software-saved half of the frame: the
        // first task has no context to restore.
        "adds r0, #32",        // 8 registers x 4 bytes
        "msr psp, r0",

        // Thread mode onto the process stack (CONTROL.SPSEL = 1).
        "movs r0, #2",
        "msr control, r0",
        "isb",

        // Unstack the hardware frame by hand; this path is a branch,
        // not an exception return.
        "pop {{r0-r3, r12}}",  // r0 carries the task parameter
        "pop {{r4}}",          // lr slot (task_exit; entries never return)
        "pop {{r5}}",          // pc slot: the entry point
        "pop {{r6}}",          // xpsr slot, discarded

        "cpsie i",
        "bx r5",

        in("r0") psp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// The context switch: parks the outgoing task's registers and PSP,
/// runs the dispatch decision, and resumes whichever task it picks.
/// Hardware stacks and unstacks R0–R3, R12, LR, PC, and xPSR around
/// this handler; it is responsible for R4–R11 and the TCB bookkeeping.
///
/// # Safety
/// Naked function invoked directly by the NVIC; follows the exact
/// Cortex-M4 exception entry/exit convention.
#[no_mangle]
#[naked]
pub unsafe extern "C" fn PendSV() {
    asm!(
        // Park the outgoing task: callee-saved half of its frame, then
        // its PSP into the TCB.
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save_context}",       // save_context(r0: psp)

        // Pick the next task; its PSP comes back in r0.
        "bl {do_schedule}",

        // Resume it.
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        // Exception return to Thread mode on PSP.
        "ldr r0, =0xFFFFFFFD",
        "bx r0",

        save_context = sym save_current_context,
        do_schedule = sym do_context_switch,
        options(noreturn)
    );
}

/// Save the current task's stack pointer. Called from PendSV.
///
/// # Safety
/// Called from assembly context with other interrupts masked by
/// priority.
#[no_mangle]
unsafe extern "C" fn save_current_context(psp: *mut u32) {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    if let Some(current) = scheduler.current_task {
        if scheduler.tasks[current].active {
            scheduler.tasks[current].stack_pointer = psp;
        }
    }
}

/// Perform the scheduling decision and return the new task's PSP.
/// Called from PendSV.
///
/// # Safety
/// Called from assembly context.
#[no_mangle]
unsafe extern "C" fn do_context_switch() -> *mut u32 {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    let next = scheduler.schedule();
    scheduler.tasks[next].stack_pointer
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler — the kernel's tick source.
///
/// Runs at `TICK_HZ`: advances the tick counter, runs the application
/// tick hook, wakes expired delays and timeouts, and pends a context
/// switch so dispatch is re-evaluated every tick.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    scheduler.tick();

    if scheduler.needs_reschedule {
        trigger_pendsv();
    }
}
