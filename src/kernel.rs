//! # Kernel
//!
//! The global scheduler instance and the entry points the rest of the kernel
//! calls: the timer interrupt, the process lifecycle collaborator, and the
//! `getpstat` / `getpinfo` / `setpriority` system calls.
//!
//! Every function takes the scheduler lock (a critical section) for exactly
//! one operation and releases it before returning. Snapshot calls copy the
//! state under the lock and encode it into the caller's buffer afterwards,
//! so lock hold time depends on the table size only.
//!
//! ## Boot Sequence
//!
//! ```text
//! kernel_main()
//!   ├─► kernel::init(config)        ← fresh scheduler, boost interval set
//!   ├─► kernel::spawn("init", 0)    ← first process, level 0
//!   └─► loop { kernel::run_idle() } ← dispatch or wait for interrupt
//!
//! timer ISR
//!   └─► kernel::on_timer_tick()     ← accounting, boost, demotion
//!         └─► true → kernel::reschedule()
//! ```

use core::cell::RefCell;

use log::{info, warn};

use crate::arch;
use crate::config::SchedConfig;
use crate::error::SchedResult;
use crate::proc::{Pid, QueueLevel, WaitChannel};
use crate::scheduler::Scheduler;
use crate::snapshot::{self, LegacySnapshot, PStat};
use crate::sync::{self, Mutex};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

static SCHEDULER: Mutex<RefCell<Scheduler>> =
    Mutex::new(RefCell::new(Scheduler::new(SchedConfig::DEFAULT)));

/// Run `f` with exclusive access to the scheduler.
///
/// Must not be re-entered from inside `f`.
pub fn with_scheduler<F, R>(f: F) -> R
where
    F: FnOnce(&mut Scheduler) -> R,
{
    sync::critical_section(|cs| {
        let mut sched = SCHEDULER.borrow_ref_mut(cs);
        f(&mut *sched)
    })
}

fn report<T>(op: &str, result: SchedResult<T>) -> SchedResult<T> {
    if let Err(err) = &result {
        if !err.is_benign() {
            warn!("sched: {} failed: {}", op, err);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Reset the scheduler to an empty table with `config`.
///
/// Called once at boot. Any previous state is discarded.
pub fn init(config: SchedConfig) -> SchedResult<()> {
    let fresh = report("init", Scheduler::with_config(config))?;
    with_scheduler(|s| *s = fresh);
    info!(
        "sched: initialized, boost every {} ticks",
        config.boost_interval
    );
    Ok(())
}

/// Timer interrupt hook. Returns `true` if the running process must yield.
pub fn on_timer_tick() -> bool {
    with_scheduler(Scheduler::tick)
}

/// Pick the next process to run. `None` means the CPU should idle.
pub fn reschedule() -> Option<Pid> {
    with_scheduler(Scheduler::schedule)
}

/// Dispatch if anything is runnable, otherwise park the CPU until the next
/// interrupt.
pub fn run_idle() -> Option<Pid> {
    let next = reschedule();
    if next.is_none() {
        arch::idle();
    }
    next
}

pub fn current_pid() -> Option<Pid> {
    with_scheduler(|s| s.current_pid())
}

// ---------------------------------------------------------------------------
// Process lifecycle collaborator
// ---------------------------------------------------------------------------

pub fn alloc(name: &str, ppid: Pid) -> SchedResult<Pid> {
    report("alloc", with_scheduler(|s| s.alloc(name, ppid)))
}

pub fn make_runnable(pid: Pid) -> SchedResult<()> {
    report("make_runnable", with_scheduler(|s| s.make_runnable(pid)))
}

pub fn spawn(name: &str, ppid: Pid) -> SchedResult<Pid> {
    report("spawn", with_scheduler(|s| s.spawn(name, ppid)))
}

pub fn yield_now() -> SchedResult<Pid> {
    with_scheduler(Scheduler::yield_current)
}

pub fn sleep(chan: WaitChannel) -> SchedResult<Pid> {
    with_scheduler(|s| s.sleep_current(chan))
}

pub fn wakeup(chan: WaitChannel) -> usize {
    with_scheduler(|s| s.wakeup(chan))
}

pub fn exit() -> SchedResult<Pid> {
    with_scheduler(Scheduler::exit_current)
}

pub fn reap(pid: Pid) -> SchedResult<()> {
    report("reap", with_scheduler(|s| s.reap(pid)))
}

// ---------------------------------------------------------------------------
// System calls
// ---------------------------------------------------------------------------

/// `setpriority(pid, level)`: administrative move to `level`.
pub fn set_priority(pid: Pid, level: i32) -> SchedResult<()> {
    // Reject the level before contending for the lock.
    report("set_priority", QueueLevel::new(level))?;
    report("set_priority", with_scheduler(|s| s.set_priority(pid, level)))
}

/// Consistent full snapshot, returned by value.
pub fn snapshot() -> PStat {
    with_scheduler(|s| s.snapshot())
}

/// `getpstat(buf)`: write the full [`PStat`] image to the front of `out`.
pub fn get_full_snapshot(out: &mut [u8]) -> SchedResult<()> {
    report("getpstat", snapshot::check_buffer::<PStat>(out.len()))?;
    let snap = snapshot();
    snapshot::encode(&snap, out).map(|_| ())
}

/// `getpinfo(buf)`: write the legacy per-process array to the front of `out`.
pub fn get_legacy_snapshot(out: &mut [u8]) -> SchedResult<()> {
    report("getpinfo", snapshot::check_buffer::<LegacySnapshot>(out.len()))?;
    let snap = with_scheduler(|s| s.legacy_snapshot());
    snapshot::encode(&snap, out).map(|_| ())
}

/// Bytes a `getpstat` buffer must provide.
pub fn full_snapshot_size() -> usize {
    <PStat as snapshot::AbiImage>::SIZE
}

/// Bytes a `getpinfo` buffer must provide.
pub fn legacy_snapshot_size() -> usize {
    <LegacySnapshot as snapshot::AbiImage>::SIZE
}
