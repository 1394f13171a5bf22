//! # Process Record Store
//!
//! The fixed-size table of process scheduling records. Each slot holds one
//! [`ProcSchedState`]; a slot is in use whenever its state is not
//! [`ProcState::Unused`].
//!
//! Pids come from a monotonically increasing counter and are never reused,
//! and [`ProcTable::reclaim`] zeroes every scheduling field before a slot can
//! be handed out again. Together these keep a new process from inheriting an
//! old one's history.

use crate::config::{NPROC, NUM_QUEUES, PROC_NAME_LEN};
use crate::error::{SchedError, SchedResult};

/// Process identifier. `0` is never assigned and stands for "no parent".
pub type Pid = i32;

/// Index of a slot in the process table.
pub type Slot = usize;

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a process slot.
///
/// ```text
///   Unused ──alloc──► Used ──make_runnable──► Runnable ◄──────────┐
///     ▲                                          │ dispatch        │ yield /
///     │ reap                                     ▼                 │ slice end
///   Zombie ◄──────────── exit ─────────────── Running ────────────┘
///                                                │ sleep
///                                                ▼
///                        Runnable ◄──wakeup── Sleeping
/// ```
///
/// The discriminants are the state codes of the snapshot ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcState {
    Unused = 0,
    Used = 1,
    Sleeping = 2,
    Runnable = 3,
    Running = 4,
    Zombie = 5,
}

impl ProcState {
    /// State code exported in snapshots.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// RUNNABLE or RUNNING: the states that count toward a queue and that a
    /// boost applies to.
    #[inline]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Runnable | Self::Running)
    }
}

// ---------------------------------------------------------------------------
// Queue levels
// ---------------------------------------------------------------------------

/// Priority class of a process. Level 0 is the highest priority.
///
/// Only values in `0..NUM_QUEUES` can be constructed, so an out-of-range
/// level cannot reach the queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueLevel(u8);

impl QueueLevel {
    pub const HIGH: Self = Self(0);
    pub const MEDIUM: Self = Self(1);
    pub const LOW: Self = Self(2);

    /// All levels in dispatch order.
    pub const ALL: [Self; NUM_QUEUES] = [Self::HIGH, Self::MEDIUM, Self::LOW];

    /// Validate a raw level coming from outside the core.
    pub fn new(level: i32) -> SchedResult<Self> {
        if (0..NUM_QUEUES as i32).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(SchedError::InvalidLevel { level })
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Time slice of this level in ticks: `2^level`.
    #[inline]
    pub const fn time_slice(self) -> u32 {
        1 << self.0
    }

    /// The next lower priority level, or `None` at the bottom.
    #[inline]
    pub const fn lower(self) -> Option<Self> {
        if (self.0 as usize) + 1 < NUM_QUEUES {
            Some(Self(self.0 + 1))
        } else {
            None
        }
    }
}

impl TryFrom<i32> for QueueLevel {
    type Error = SchedError;

    fn try_from(level: i32) -> SchedResult<Self> {
        Self::new(level)
    }
}

impl From<QueueLevel> for i32 {
    fn from(level: QueueLevel) -> i32 {
        level.0 as i32
    }
}

// ---------------------------------------------------------------------------
// Names and wait channels
// ---------------------------------------------------------------------------

/// Short, NUL-padded process label. Informational only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcName([u8; PROC_NAME_LEN]);

impl ProcName {
    pub const EMPTY: Self = Self([0; PROC_NAME_LEN]);

    /// Copy at most `PROC_NAME_LEN - 1` bytes, cut on a char boundary so the
    /// stored name stays valid UTF-8 and always keeps a trailing NUL.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(PROC_NAME_LEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; PROC_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(PROC_NAME_LEN);
        core::str::from_utf8(&self.0[..len]).unwrap_or("?")
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; PROC_NAME_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for ProcName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Opaque token a sleeping process waits on. Any wakeup on the same channel
/// makes every sleeper on it runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitChannel(pub usize);

// ---------------------------------------------------------------------------
// Per-process scheduling record
// ---------------------------------------------------------------------------

/// Scheduling fields of one process.
#[derive(Debug, Clone, Copy)]
pub struct ProcSchedState {
    pub pid: Pid,
    pub ppid: Pid,
    pub state: ProcState,
    pub level: QueueLevel,

    /// Ticks consumed in the current slice window. Reset on dispatch, wakeup,
    /// demotion, boost and administrative moves.
    pub ticks_in_slice: u32,

    /// Lifetime ticks spent RUNNING. Never reset while the slot is live.
    pub ticks_total: u32,

    pub num_scheduled: u32,
    pub num_demoted: u32,
    pub num_boosted: u32,

    pub name: ProcName,

    /// Channel this process sleeps on, set only while SLEEPING.
    pub chan: Option<WaitChannel>,
}

impl ProcSchedState {
    /// A zeroed, unused slot.
    pub const EMPTY: Self = Self {
        pid: 0,
        ppid: 0,
        state: ProcState::Unused,
        level: QueueLevel::HIGH,
        ticks_in_slice: 0,
        ticks_total: 0,
        num_scheduled: 0,
        num_demoted: 0,
        num_boosted: 0,
        name: ProcName::EMPTY,
        chan: None,
    };

    #[inline]
    pub fn in_use(&self) -> bool {
        self.state != ProcState::Unused
    }

    /// Allowance of the current level, derived rather than stored.
    #[inline]
    pub fn time_slice(&self) -> u32 {
        self.level.time_slice()
    }

    #[inline]
    pub fn slice_exhausted(&self) -> bool {
        self.ticks_in_slice >= self.time_slice()
    }
}

// ---------------------------------------------------------------------------
// Process table
// ---------------------------------------------------------------------------

/// Arena of process slots with an explicit in-use state per slot.
pub struct ProcTable {
    slots: [ProcSchedState; NPROC],
    next_pid: Pid,
}

impl ProcTable {
    pub const fn new() -> Self {
        Self {
            slots: [ProcSchedState::EMPTY; NPROC],
            next_pid: 1,
        }
    }

    /// Claim the first free slot for a new process in state USED, at level 0
    /// with all counters zeroed.
    pub fn alloc(&mut self, name: &str, ppid: Pid) -> SchedResult<Slot> {
        let slot = self
            .slots
            .iter()
            .position(|p| !p.in_use())
            .ok_or(SchedError::TableFull)?;

        // Pids are never recycled; an exhausted pid space is a full table.
        let pid = self.next_pid;
        self.next_pid = pid.checked_add(1).ok_or(SchedError::TableFull)?;

        self.slots[slot] = ProcSchedState {
            pid,
            ppid,
            state: ProcState::Used,
            name: ProcName::new(name),
            ..ProcSchedState::EMPTY
        };
        Ok(slot)
    }

    /// Slot of the live process `pid`. A miss is a normal outcome.
    pub fn find(&self, pid: Pid) -> Option<Slot> {
        self.slots.iter().position(|p| p.in_use() && p.pid == pid)
    }

    pub fn lookup(&self, pid: Pid) -> Option<&ProcSchedState> {
        self.find(pid).map(|slot| &self.slots[slot])
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> &ProcSchedState {
        &self.slots[slot]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, slot: Slot) -> &mut ProcSchedState {
        &mut self.slots[slot]
    }

    /// Return a slot to the free pool, clearing every field.
    pub(crate) fn reclaim(&mut self, slot: Slot) {
        self.slots[slot] = ProcSchedState::EMPTY;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ProcSchedState)> {
        self.slots.iter().enumerate()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (Slot, &mut ProcSchedState)> {
        self.slots.iter_mut().enumerate()
    }

    pub fn in_use_count(&self) -> usize {
        self.slots.iter().filter(|p| p.in_use()).count()
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
