//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstraction. All shared kernel state
//! (the scheduler context) must be accessed within a critical section to
//! prevent races between thread mode and interrupt handlers.
//!
//! Critical sections are the *only* mutual-exclusion the kernel needs:
//! tasks share no other mutable state, because all inter-task data flows
//! through message queues by copy. Keep them as short as possible to
//! bound interrupt latency — every kernel entry point does one bounded
//! piece of bookkeeping inside the section and nothing else.
//!
//! On the host (unit tests) there are no interrupts and the tests are
//! single-threaded, so the section reduces to running the closure.

/// Execute a closure with interrupts disabled (on hardware).
///
/// # Usage
/// ```ignore
/// sync::critical_section(|| {
///     // Access shared kernel state safely
/// });
/// ```
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    cortex_m::interrupt::free(|_| f())
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}
