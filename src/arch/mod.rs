//! # Architecture Abstraction Layer
//!
//! The only hardware service the scheduler core needs is a way to park the
//! CPU when every ready queue is empty. Trap entry, timer programming and
//! context switching belong to the embedding kernel.

/// Wait for the next interrupt.
///
/// On Cortex-M this is `wfi`; the timer interrupt wakes the core and the
/// kernel's tick handler runs before control returns here.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline]
pub fn idle() {
    cortex_m::asm::wfi();
}

/// Hosted and non-ARM builds have no interrupt to wait for; hint the CPU
/// and return so the caller's loop can poll again.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline]
pub fn idle() {
    core::hint::spin_loop();
}
