//! # Cadence Configuration
//!
//! Compile-time constants governing the kernel. All limits are fixed at
//! compile time — no dynamic allocation anywhere in the system.

/// Maximum number of tasks the system can manage simultaneously,
/// including the idle task. Bounds the static TCB array. Increase with
/// care — each task consumes `STACK_SIZE` bytes of RAM.
pub const MAX_TASKS: usize = 8;

/// Maximum number of message queues.
pub const MAX_QUEUES: usize = 4;

/// Maximum capacity of a single message queue. A queue's actual capacity
/// is fixed at creation and may be anything in `1..=QUEUE_DEPTH`.
pub const QUEUE_DEPTH: usize = 16;

/// Payload size of a queue message in bytes. The demo protocol uses a
/// 25-byte text buffer with a trailing newline.
pub const MESSAGE_DATA_LEN: usize = 25;

/// Maximum length of a task name, in bytes. Longer names are truncated.
pub const TASK_NAME_LEN: usize = 20;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
/// Higher values give finer scheduling precision at the cost of
/// increased interrupt overhead.
pub const TICK_HZ: u32 = 1000;

/// Per-task stack size in bytes. Must be large enough for the deepest
/// call chain plus the hardware exception frame (32 bytes) and the
/// software-saved context (32 bytes for R4–R11).
pub const STACK_SIZE: usize = 1024;

/// Priority of the idle task. The lowest possible — the idle task runs
/// only when no application task is Ready.
pub const IDLE_PRIORITY: u8 = 0;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;
