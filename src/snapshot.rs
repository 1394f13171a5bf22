//! # Snapshot Exporter
//!
//! Point-in-time copies of the scheduler for external readers (monitors,
//! test harnesses). Two layouts are exported:
//!
//! - [`PStat`]: system-wide counters plus one [`ProcStat`] per slot
//! - the legacy [`ProcInfo`] array: a reduced per-process view with no
//!   system-wide aggregate
//!
//! Both are built from one `&Scheduler` borrow, so a capture taken under the
//! kernel's critical section can never mix two different ticks. Derived
//! counts (`queue_count`, `runnable_count`, ...) are computed from that same
//! view rather than maintained incrementally.
//!
//! ## ABI
//!
//! The records are `#[repr(C)]`, built only from `i32` and byte arrays, and
//! contain no padding (checked at compile time below). Counters that do not
//! fit an `i32` saturate at `i32::MAX`.

use core::mem::size_of;

use static_assertions::const_assert_eq;

use crate::config::{NPROC, NUM_QUEUES, PROC_NAME_LEN};
use crate::error::{SchedError, SchedResult};
use crate::proc::{ProcSchedState, ProcState};
use crate::scheduler::Scheduler;

// ---------------------------------------------------------------------------
// ABI records
// ---------------------------------------------------------------------------

/// Per-process entry of the full snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStat {
    /// 1 if the slot holds a process, 0 otherwise.
    pub inuse: i32,
    pub pid: i32,
    pub ppid: i32,
    /// State code, see [`ProcState`].
    pub state: i32,
    /// Queue level, 0 highest.
    pub priority: i32,

    pub ticks_current: i32,
    pub ticks_total: i32,
    /// Slice length of the current level: 1, 2 or 4.
    pub time_slice: i32,

    pub num_scheduled: i32,
    pub num_demoted: i32,
    pub num_boosted: i32,

    pub name: [u8; PROC_NAME_LEN],
}

/// System-wide part of the full snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlfqStat {
    pub global_ticks: i32,
    pub last_boost_tick: i32,
    pub next_boost_in: i32,
    /// RUNNABLE + RUNNING processes per level.
    pub queue_count: [i32; NUM_QUEUES],
    /// Slots whose state is not UNUSED.
    pub total_processes: i32,
    pub running_count: i32,
    pub sleeping_count: i32,
    pub runnable_count: i32,
}

/// Full snapshot image.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PStat {
    pub sys: MlfqStat,
    pub procs: [ProcStat; NPROC],
}

/// Legacy per-process record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcInfo {
    pub inuse: i32,
    pub pid: i32,
    pub priority: i32,
    pub state: i32,
    pub ticks_used: i32,
    pub ticks_total: i32,
    pub name: [u8; PROC_NAME_LEN],
}

/// Legacy snapshot image: one record per slot.
pub type LegacySnapshot = [ProcInfo; NPROC];

const_assert_eq!(size_of::<ProcStat>(), 11 * 4 + PROC_NAME_LEN);
const_assert_eq!(size_of::<MlfqStat>(), (7 + NUM_QUEUES) * 4);
const_assert_eq!(size_of::<PStat>(), size_of::<MlfqStat>() + NPROC * size_of::<ProcStat>());
const_assert_eq!(size_of::<ProcInfo>(), 6 * 4 + PROC_NAME_LEN);

#[inline]
fn sat<T: TryInto<i32>>(v: T) -> i32 {
    v.try_into().unwrap_or(i32::MAX)
}

fn name_of(bytes: &[u8; PROC_NAME_LEN]) -> &str {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(PROC_NAME_LEN);
    core::str::from_utf8(&bytes[..len]).unwrap_or("?")
}

impl ProcStat {
    pub const EMPTY: Self = Self {
        inuse: 0,
        pid: 0,
        ppid: 0,
        state: 0,
        priority: 0,
        ticks_current: 0,
        ticks_total: 0,
        time_slice: 0,
        num_scheduled: 0,
        num_demoted: 0,
        num_boosted: 0,
        name: [0; PROC_NAME_LEN],
    };

    fn from_record(p: &ProcSchedState) -> Self {
        if !p.in_use() {
            return Self::EMPTY;
        }
        Self {
            inuse: 1,
            pid: p.pid,
            ppid: p.ppid,
            state: p.state.code(),
            priority: p.level.into(),
            ticks_current: sat(p.ticks_in_slice),
            ticks_total: sat(p.ticks_total),
            time_slice: sat(p.time_slice()),
            num_scheduled: sat(p.num_scheduled),
            num_demoted: sat(p.num_demoted),
            num_boosted: sat(p.num_boosted),
            name: *p.name.as_bytes(),
        }
    }

    pub fn name(&self) -> &str {
        name_of(&self.name)
    }
}

impl ProcInfo {
    pub const EMPTY: Self = Self {
        inuse: 0,
        pid: 0,
        priority: 0,
        state: 0,
        ticks_used: 0,
        ticks_total: 0,
        name: [0; PROC_NAME_LEN],
    };

    fn from_record(p: &ProcSchedState) -> Self {
        if !p.in_use() {
            return Self::EMPTY;
        }
        Self {
            inuse: 1,
            pid: p.pid,
            priority: p.level.into(),
            state: p.state.code(),
            ticks_used: sat(p.ticks_in_slice),
            ticks_total: sat(p.ticks_total),
            name: *p.name.as_bytes(),
        }
    }

    pub fn name(&self) -> &str {
        name_of(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

impl PStat {
    /// Copy the whole scheduler state and compute the aggregates.
    pub fn capture(sched: &Scheduler) -> Self {
        let mut procs = [ProcStat::EMPTY; NPROC];
        let mut queue_count = [0i32; NUM_QUEUES];
        let (mut total, mut running, mut sleeping, mut runnable) = (0, 0, 0, 0);

        for (slot, p) in sched.table().iter() {
            procs[slot] = ProcStat::from_record(p);
            if !p.in_use() {
                continue;
            }
            total += 1;
            match p.state {
                ProcState::Running => running += 1,
                ProcState::Runnable => runnable += 1,
                ProcState::Sleeping => sleeping += 1,
                _ => {}
            }
            if p.state.is_schedulable() {
                queue_count[p.level.index()] += 1;
            }
        }

        let now = sched.global_ticks();
        let clock = sched.boost_clock();
        Self {
            sys: MlfqStat {
                global_ticks: sat(now),
                last_boost_tick: sat(clock.last_boost_tick),
                next_boost_in: sat(clock.next_boost_in(now)),
                queue_count,
                total_processes: total,
                running_count: running,
                sleeping_count: sleeping,
                runnable_count: runnable,
            },
            procs,
        }
    }

    /// Entry for `pid` among the in-use slots.
    pub fn find(&self, pid: i32) -> Option<&ProcStat> {
        self.procs.iter().find(|p| p.inuse != 0 && p.pid == pid)
    }
}

/// Reduced per-process copy of the scheduler state.
pub fn capture_legacy(sched: &Scheduler) -> LegacySnapshot {
    let mut out = [ProcInfo::EMPTY; NPROC];
    for (slot, p) in sched.table().iter() {
        out[slot] = ProcInfo::from_record(p);
    }
    out
}

impl Scheduler {
    pub fn snapshot(&self) -> PStat {
        PStat::capture(self)
    }

    pub fn legacy_snapshot(&self) -> LegacySnapshot {
        capture_legacy(self)
    }
}

// ---------------------------------------------------------------------------
// Byte images
// ---------------------------------------------------------------------------

/// Plain-data records that can be copied to and from raw buffers.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, contain no padding and accept every
/// bit pattern (only integers and integer arrays).
pub unsafe trait AbiImage: Copy {
    const SIZE: usize = size_of::<Self>();
}

unsafe impl AbiImage for PStat {}
unsafe impl AbiImage for LegacySnapshot {}

/// Fail with `InvalidBuffer` unless `len` bytes can hold a `T`.
pub fn check_buffer<T: AbiImage>(len: usize) -> SchedResult<()> {
    if len < T::SIZE {
        return Err(SchedError::InvalidBuffer {
            len,
            required: T::SIZE,
        });
    }
    Ok(())
}

/// Copy `value` into the front of `out`. Returns the number of bytes
/// written.
pub fn encode<T: AbiImage>(value: &T, out: &mut [u8]) -> SchedResult<usize> {
    check_buffer::<T>(out.len())?;
    // SAFETY: `T: AbiImage` has no padding, so all `T::SIZE` bytes behind
    // `value` are initialized.
    let bytes = unsafe { core::slice::from_raw_parts((value as *const T).cast::<u8>(), T::SIZE) };
    out[..T::SIZE].copy_from_slice(bytes);
    Ok(T::SIZE)
}

/// Read a `T` back from the front of `bytes`.
pub fn decode<T: AbiImage>(bytes: &[u8]) -> SchedResult<T> {
    check_buffer::<T>(bytes.len())?;
    // SAFETY: length checked above; every bit pattern is a valid `T` and the
    // unaligned read makes no assumption about the buffer's alignment.
    Ok(unsafe { core::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
}
