//! # Synchronization Primitives
//!
//! Interrupt-safe critical section for the scheduler. All scheduling state
//! is shared between the timer interrupt and synchronous kernel paths, so
//! every access goes through [`critical_section`].
//!
//! The implementation is provided by the target: `cortex-m`'s
//! `critical-section-single-core` feature masks interrupts on Cortex-M, and
//! the `std` feature of `critical-section` uses a global lock on hosted
//! builds.

pub use critical_section::{CriticalSection, Mutex};

/// Execute a closure within a critical section.
///
/// The section is left when the closure returns, on every path including
/// early returns of `?` inside it. Nothing executed inside may block.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     let mut sched = SCHEDULER.borrow_ref_mut(cs);
///     sched.tick()
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
