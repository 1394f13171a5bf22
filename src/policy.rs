//! # Demotion / Boost Policy
//!
//! The two rules that move processes between levels:
//!
//! | Rule | Trigger | Effect |
//! |------|---------|--------|
//! | Demotion | RUNNING process fills `2^level` ticks | level + 1 (capped at 2), slice restarts |
//! | Boost | `boost_interval` ticks since the last boost | every RUNNABLE/RUNNING process below 0 goes to 0 |
//!
//! Boost is evaluated before demotion on the same tick. It is the only rule
//! that raises priority, so it bounds how long any process can sit in a low
//! queue. Processes that block before their slice fills never meet the
//! demotion rule and keep their level.

use crate::proc::{ProcSchedState, ProcState, ProcTable, QueueLevel};
use crate::queue::ReadyQueues;
use crate::sched_assert;

// ---------------------------------------------------------------------------
// Boost clock
// ---------------------------------------------------------------------------

/// Tracks when the next global boost is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostClock {
    pub boost_interval: u64,
    pub last_boost_tick: u64,
}

impl BoostClock {
    pub const fn new(boost_interval: u64) -> Self {
        Self {
            boost_interval,
            last_boost_tick: 0,
        }
    }

    #[inline]
    pub fn is_due(&self, global_ticks: u64) -> bool {
        global_ticks - self.last_boost_tick >= self.boost_interval
    }

    /// Ticks left until the next boost fires.
    #[inline]
    pub fn next_boost_in(&self, global_ticks: u64) -> u64 {
        self.boost_interval
            .saturating_sub(global_ticks - self.last_boost_tick)
    }

    #[inline]
    pub fn mark(&mut self, global_ticks: u64) {
        self.last_boost_tick = global_ticks;
    }
}

// ---------------------------------------------------------------------------
// Boost
// ---------------------------------------------------------------------------

fn promote(p: &mut ProcSchedState) {
    p.level = QueueLevel::HIGH;
    p.ticks_in_slice = 0;
    p.num_boosted += 1;
}

/// Move every RUNNABLE and RUNNING process below level 0 back to level 0.
///
/// Queued processes are drained from the medium then the low queue in FIFO
/// order and appended to the high queue, so their relative order survives
/// the boost. A RUNNING process is not linked anywhere; only its record is
/// updated and it is queued at level 0 when it next leaves the CPU.
///
/// Returns the number of processes boosted.
pub fn boost_all(table: &mut ProcTable, queues: &mut ReadyQueues) -> usize {
    let mut boosted = 0;

    for level in [QueueLevel::MEDIUM, QueueLevel::LOW] {
        while let Some(slot) = queues.dequeue_head(level) {
            let p = table.get_mut(slot);
            sched_assert!(
                p.state == ProcState::Runnable && p.level == level,
                "pid {} on queue {} has state {:?} level {}",
                p.pid,
                level.index(),
                p.state,
                p.level.index()
            );
            promote(p);
            queues.enqueue(slot, QueueLevel::HIGH);
            boosted += 1;
        }
    }

    for (_, p) in table.iter_mut() {
        if p.state == ProcState::Running && p.level != QueueLevel::HIGH {
            promote(p);
            boosted += 1;
        }
    }

    boosted
}

// ---------------------------------------------------------------------------
// Demotion
// ---------------------------------------------------------------------------

/// What slice exhaustion did to the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Slice not used up yet; keep running.
    Continue,
    /// Moved one level down.
    Demoted { from: QueueLevel, to: QueueLevel },
    /// Already at the lowest level; the slice restarts in place.
    Renewed,
}

impl SliceOutcome {
    /// Whether the process must give up the CPU.
    #[inline]
    pub fn must_yield(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Apply the demotion rule to the RUNNING process `p`.
///
/// The process must not be linked on any queue while this runs: only its
/// record changes here, and the caller queues it at its new level when it
/// yields.
pub fn charge_slice(p: &mut ProcSchedState) -> SliceOutcome {
    if !p.slice_exhausted() {
        return SliceOutcome::Continue;
    }

    p.ticks_in_slice = 0;
    match p.level.lower() {
        Some(to) => {
            let from = p.level;
            p.level = to;
            p.num_demoted += 1;
            SliceOutcome::Demoted { from, to }
        }
        None => SliceOutcome::Renewed,
    }
}
