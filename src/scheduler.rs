//! # Scheduler
//!
//! The MLFQ engine: tick accounting, dispatch, and the lifecycle and
//! administrative entry points that the rest of the kernel calls.
//!
//! ## Per-tick sequence
//!
//! 1. `global_ticks += 1`
//! 2. The RUNNING process, if any, is charged one tick (`ticks_total`,
//!    `ticks_in_slice`)
//! 3. Global boost, if due (see [`policy::boost_all`])
//! 4. Demotion of the RUNNING process if its slice is full and the boost
//!    did not just reset it
//! 5. `needs_reschedule` is raised when the RUNNING process must yield
//!
//! ## Dispatch
//!
//! Queues are scanned 0, 1, 2; the head of the first non-empty queue runs.
//! Within a level the order is strict arrival order.
//!
//! All methods take `&mut self`. The [`kernel`](crate::kernel) module owns the
//! single instance behind a critical section, which is what makes every
//! operation here atomic with respect to the timer interrupt.

use log::{debug, info, trace};

use crate::config::{SchedConfig, NPROC};
use crate::error::{SchedError, SchedResult};
use crate::policy::{self, BoostClock, SliceOutcome};
use crate::proc::{Pid, ProcSchedState, ProcState, ProcTable, QueueLevel, Slot, WaitChannel};
use crate::queue::ReadyQueues;
use crate::sched_assert;

/// Scheduler state: process table, ready queues and the global clock.
pub struct Scheduler {
    table: ProcTable,
    queues: ReadyQueues,
    global_ticks: u64,
    boost: BoostClock,

    /// Slot of the RUNNING process. `None` while the CPU idles.
    current: Option<Slot>,

    /// Raised when the RUNNING process must leave the CPU.
    needs_reschedule: bool,
}

impl Scheduler {
    /// Build an empty scheduler. `config` is not validated here so the
    /// constructor can run in a `static` initializer; use
    /// [`Scheduler::with_config`] for untrusted settings.
    pub const fn new(config: SchedConfig) -> Self {
        Self {
            table: ProcTable::new(),
            queues: ReadyQueues::new(),
            global_ticks: 0,
            boost: BoostClock::new(config.boost_interval),
            current: None,
            needs_reschedule: false,
        }
    }

    pub fn with_config(config: SchedConfig) -> SchedResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    #[inline]
    pub fn global_ticks(&self) -> u64 {
        self.global_ticks
    }

    #[inline]
    pub fn boost_clock(&self) -> &BoostClock {
        &self.boost
    }

    #[inline]
    pub fn table(&self) -> &ProcTable {
        &self.table
    }

    #[inline]
    pub fn queues(&self) -> &ReadyQueues {
        &self.queues
    }

    #[inline]
    pub fn needs_reschedule(&self) -> bool {
        self.needs_reschedule
    }

    /// Record of the live process `pid`, or `None`.
    pub fn lookup(&self, pid: Pid) -> Option<&ProcSchedState> {
        self.table.lookup(pid)
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current.map(|slot| self.table.get(slot).pid)
    }

    fn find(&self, pid: Pid) -> SchedResult<Slot> {
        self.table.find(pid).ok_or(SchedError::NotFound { pid })
    }

    fn current_slot(&self) -> SchedResult<Slot> {
        let slot = self.current.ok_or(SchedError::NoCurrent)?;
        sched_assert!(
            self.table.get(slot).state == ProcState::Running,
            "current slot {} is {:?}",
            slot,
            self.table.get(slot).state
        );
        Ok(slot)
    }

    // -----------------------------------------------------------------------
    // Process lifecycle
    // -----------------------------------------------------------------------

    /// Allocate a record in state USED. The process is not schedulable until
    /// [`Scheduler::make_runnable`].
    pub fn alloc(&mut self, name: &str, ppid: Pid) -> SchedResult<Pid> {
        let slot = self.table.alloc(name, ppid)?;
        let pid = self.table.get(slot).pid;
        debug!("sched: alloc pid {} ({}) in slot {}", pid, name, slot);
        Ok(pid)
    }

    /// USED → RUNNABLE, queued at the tail of level 0.
    pub fn make_runnable(&mut self, pid: Pid) -> SchedResult<()> {
        let slot = self.find(pid)?;
        let p = self.table.get_mut(slot);
        if p.state != ProcState::Used {
            return Err(SchedError::InvalidState { pid });
        }
        p.state = ProcState::Runnable;
        let level = p.level;
        self.queues.enqueue(slot, level);
        Ok(())
    }

    /// Allocate and queue a new process in one step.
    pub fn spawn(&mut self, name: &str, ppid: Pid) -> SchedResult<Pid> {
        let pid = self.alloc(name, ppid)?;
        self.make_runnable(pid)?;
        Ok(pid)
    }

    /// RUNNING → RUNNABLE at the tail of the process's current level.
    ///
    /// Used both for preemption at slice end (the level is already the
    /// demoted one) and for a voluntary yield.
    pub fn yield_current(&mut self) -> SchedResult<Pid> {
        let slot = self.current_slot()?;
        let pid = self.requeue(slot);
        self.needs_reschedule = true;
        Ok(pid)
    }

    /// Put the RUNNING process in `slot` back at the tail of its level.
    fn requeue(&mut self, slot: Slot) -> Pid {
        let p = self.table.get_mut(slot);
        p.state = ProcState::Runnable;
        let (pid, level) = (p.pid, p.level);

        self.queues.enqueue(slot, level);
        self.current = None;
        trace!("sched: pid {} requeued on level {}", pid, level.index());
        pid
    }

    /// RUNNING → SLEEPING on `chan`. The level is kept; slice usage is
    /// forgotten when the process wakes.
    pub fn sleep_current(&mut self, chan: WaitChannel) -> SchedResult<Pid> {
        let slot = self.current_slot()?;
        let p = self.table.get_mut(slot);
        p.state = ProcState::Sleeping;
        p.chan = Some(chan);
        let pid = p.pid;

        self.current = None;
        self.needs_reschedule = true;
        debug!("sched: pid {} sleeps on {:#x}", pid, chan.0);
        Ok(pid)
    }

    /// Make every process sleeping on `chan` RUNNABLE at its unchanged level
    /// with a fresh slice. Returns how many were woken.
    pub fn wakeup(&mut self, chan: WaitChannel) -> usize {
        let mut woken = 0;
        for slot in 0..NPROC {
            let p = self.table.get_mut(slot);
            if p.state != ProcState::Sleeping || p.chan != Some(chan) {
                continue;
            }
            p.state = ProcState::Runnable;
            p.chan = None;
            p.ticks_in_slice = 0;
            let (pid, level) = (p.pid, p.level);

            self.queues.enqueue(slot, level);
            woken += 1;
            debug!("sched: wake pid {} on level {}", pid, level.index());
        }
        woken
    }

    /// RUNNING → ZOMBIE. The slot stays in use until the parent reaps it.
    pub fn exit_current(&mut self) -> SchedResult<Pid> {
        let slot = self.current_slot()?;
        let p = self.table.get_mut(slot);
        p.state = ProcState::Zombie;
        let pid = p.pid;

        self.current = None;
        self.needs_reschedule = true;
        debug!("sched: pid {} exited at tick {}", pid, self.global_ticks);
        Ok(pid)
    }

    /// Free the slot of an exited process (or of one that never became
    /// runnable), zeroing all of its scheduling fields.
    pub fn reap(&mut self, pid: Pid) -> SchedResult<()> {
        let slot = self.find(pid)?;
        match self.table.get(slot).state {
            ProcState::Zombie | ProcState::Used => {
                self.table.reclaim(slot);
                debug!("sched: reaped pid {}, slot {} free", pid, slot);
                Ok(())
            }
            _ => Err(SchedError::InvalidState { pid }),
        }
    }

    // -----------------------------------------------------------------------
    // Tick accounting
    // -----------------------------------------------------------------------

    /// Timer interrupt entry. Advances the clocks, charges the RUNNING
    /// process and applies boost then demotion.
    ///
    /// Returns `true` if the RUNNING process must yield.
    pub fn tick(&mut self) -> bool {
        self.global_ticks += 1;

        if let Some(slot) = self.current {
            let p = self.table.get_mut(slot);
            p.ticks_total += 1;
            p.ticks_in_slice += 1;
        }

        let mut current_boosted = false;
        if self.boost.is_due(self.global_ticks) {
            let before = self.current.map(|slot| self.table.get(slot).num_boosted);
            let boosted = policy::boost_all(&mut self.table, &mut self.queues);
            self.boost.mark(self.global_ticks);
            current_boosted = match (before, self.current) {
                (Some(n), Some(slot)) => self.table.get(slot).num_boosted != n,
                _ => false,
            };
            info!(
                "sched: boost at tick {}, {} processes to level 0",
                self.global_ticks, boosted
            );
        }

        if let Some(slot) = self.current {
            if !current_boosted {
                let p = self.table.get_mut(slot);
                match policy::charge_slice(p) {
                    SliceOutcome::Continue => {}
                    SliceOutcome::Demoted { from, to } => {
                        debug!(
                            "sched: pid {} demoted {} -> {} at tick {}",
                            p.pid,
                            from.index(),
                            to.index(),
                            self.global_ticks
                        );
                        self.needs_reschedule = true;
                    }
                    SliceOutcome::Renewed => {
                        self.needs_reschedule = true;
                    }
                }
            }
        }

        self.needs_reschedule
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Select the next process to run and mark it RUNNING.
    ///
    /// A process still RUNNING at this point is first put back at the tail
    /// of its level. Returns `None` if every queue is empty and the CPU
    /// should idle.
    pub fn schedule(&mut self) -> Option<Pid> {
        if let Some(slot) = self.current {
            self.requeue(slot);
        }
        self.needs_reschedule = false;

        for level in QueueLevel::ALL {
            if let Some(slot) = self.queues.dequeue_head(level) {
                let p = self.table.get_mut(slot);
                sched_assert!(
                    p.state == ProcState::Runnable && p.level == level,
                    "dequeued pid {} is {:?} at level {}, queue {}",
                    p.pid,
                    p.state,
                    p.level.index(),
                    level.index()
                );
                p.state = ProcState::Running;
                p.num_scheduled += 1;
                p.ticks_in_slice = 0;
                let pid = p.pid;

                self.current = Some(slot);
                trace!("sched: dispatch pid {} from level {}", pid, level.index());
                return Some(pid);
            }
        }

        trace!("sched: idle at tick {}", self.global_ticks);
        None
    }

    // -----------------------------------------------------------------------
    // Administrative override
    // -----------------------------------------------------------------------

    /// Move `pid` to `level` out of band.
    ///
    /// History counters are left alone so policy moves stay distinguishable
    /// from administrative ones. The slice restarts at the new level. A
    /// RUNNING process moved down must leave the CPU, as on a demotion.
    /// Exited processes are no longer live and report `NotFound`.
    pub fn set_priority(&mut self, pid: Pid, level: i32) -> SchedResult<()> {
        let level = QueueLevel::new(level)?;
        let slot = self.find(pid)?;
        if self.table.get(slot).state == ProcState::Zombie {
            return Err(SchedError::NotFound { pid });
        }

        let linked = self.queues.remove(slot);
        let p = self.table.get_mut(slot);
        let from = p.level;
        p.level = level;
        p.ticks_in_slice = 0;
        if linked.is_some() {
            self.queues.enqueue(slot, level);
        }
        if self.current == Some(slot) && level > from {
            self.needs_reschedule = true;
        }

        info!(
            "sched: pid {} priority set {} -> {}",
            pid,
            from.index(),
            level.index()
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Walk the whole data model and halt on any violated invariant.
    ///
    /// O(NPROC × queue length); meant for tests and debug kernels, not for
    /// the tick path.
    pub fn check_invariants(&self) {
        let mut running = 0;
        let mut runnable = 0;

        for (slot, p) in self.table.iter() {
            if !p.in_use() {
                sched_assert!(
                    self.queues.level_of(slot).is_none(),
                    "free slot {} is queued",
                    slot
                );
                continue;
            }

            if p.state.is_schedulable() {
                sched_assert!(
                    p.ticks_in_slice < p.time_slice(),
                    "pid {} at rest with {} ticks in a {}-tick slice",
                    p.pid,
                    p.ticks_in_slice,
                    p.time_slice()
                );
            }

            let linked = self.queues.level_of(slot);
            match p.state {
                ProcState::Runnable => {
                    runnable += 1;
                    sched_assert!(
                        linked == Some(p.level),
                        "runnable pid {} at level {} linked on {:?}",
                        p.pid,
                        p.level.index(),
                        linked.map(QueueLevel::index)
                    );
                }
                ProcState::Running => {
                    running += 1;
                    sched_assert!(
                        self.current == Some(slot) && linked.is_none(),
                        "running pid {} is not the unlinked current process",
                        p.pid
                    );
                }
                _ => sched_assert!(linked.is_none(), "pid {} queued while {:?}", p.pid, p.state),
            }
        }

        sched_assert!(running <= 1, "{} processes RUNNING", running);
        sched_assert!(
            self.queues.total_len() == runnable,
            "{} queued entries for {} runnable processes",
            self.queues.total_len(),
            runnable
        );
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedConfig::DEFAULT)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
