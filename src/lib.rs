//! # Cadence — a periodic-task real-time kernel
//!
//! A small preemptive RTOS kernel for ARM Cortex-M4 built around the
//! periodic-task model: every application task is released at a fixed
//! interval, does its work, and sleeps until its next release with
//! drift-free `delay_until` semantics. Tasks communicate exclusively
//! through bounded message queues — data moves by copy, never by
//! shared reference.
//!
//! Two dispatch policies are available, chosen at kernel init:
//!
//! - **Fixed priority**: highest priority Ready task runs; equal
//!   priorities round-robin.
//! - **Earliest Deadline First (EDF)**: the Ready task whose deadline
//!   (its next release) is nearest runs; ties resolve by release time,
//!   then creation order, so schedules replay deterministically.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   Application Tasks                     │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · create_periodic() · delay_until() ·          │
//! │   send_to_back() · receive() · start()                  │
//! ├──────────────┬───────────────────┬────────────────────┤
//! │  Scheduler   │  Policy           │  Message Queues    │
//! │  scheduler.rs│  policy.rs        │  queue.rs          │
//! │  ─ tick()    │  ─ fixed priority │  ─ bounded FIFO    │
//! │  ─ schedule()│  ─ EDF + ties     │  ─ FIFO wait lists │
//! │  ─ delay_until│                  │                    │
//! ├──────────────┴───────────────────┴────────────────────┤
//! │         Task Model (task.rs) · Hooks (hooks.rs)        │
//! │   TCB · TaskState · BlockReason · tags · tick hook     │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)               │
//! │    PendSV · SysTick · Context Switch · Stack Init      │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)               │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing Model
//!
//! Time is counted in ticks from a hardware timer interrupt (SysTick).
//! The counter is a `u32` with defined wrap-around semantics
//! ([`time`]). Timeouts resolve at tick granularity: a timeout may fire
//! up to one tick-period late, never early. A periodic instance that
//! outruns its period is re-released immediately at the current tick
//! and the overrun is recorded — observable through the hook layer,
//! never fatal.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **No `alloc`**: pure `core` only
//! - **Fixed-size TCB array**: `[TaskControlBlock; MAX_TASKS]`
//! - **Per-task stack**: `[u8; STACK_SIZE]` inline in the TCB
//! - **Messages by copy**: senders and receivers never alias memory
//! - **Critical sections**: `cortex_m::interrupt::free()` for shared
//!   state on hardware
//!
//! The scheduler core is pure logic over this state and builds on any
//! target; only `kernel`/`arch` (globals, context switching, SysTick)
//! are Cortex-M specific. Unit tests drive the core with simulated
//! ticks on the host.

#![no_std]

pub mod config;
pub mod error;
pub mod hooks;
pub mod io;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod time;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod arch;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod kernel;
