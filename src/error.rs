//! # Scheduler Errors
//!
//! Every failure the core reports is local and recoverable by the caller.
//! Corruption of the data model is not an error value: it is caught by
//! [`sched_assert!`](crate::sched_assert) and halts the scheduler subsystem.

use core::fmt;

use crate::proc::Pid;

/// Errors returned by the scheduler's control and export entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// No live process carries this pid. Expected during teardown races.
    NotFound { pid: Pid },

    /// Requested queue level is outside `0..NUM_QUEUES`.
    InvalidLevel { level: i32 },

    /// Destination buffer cannot hold the exported image.
    InvalidBuffer { len: usize, required: usize },

    /// Every process slot is in use.
    TableFull,

    /// The process exists but is not in a state that allows the request
    /// (e.g. reaping a process that has not exited).
    InvalidState { pid: Pid },

    /// A call that acts on the running process was made while the CPU idles.
    NoCurrent,

    /// Rejected scheduler configuration.
    InvalidConfig,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { pid } => write!(f, "process {} not found", pid),
            Self::InvalidLevel { level } => write!(f, "invalid queue level {}", level),
            Self::InvalidBuffer { len, required } => {
                write!(f, "buffer of {} bytes, {} required", len, required)
            }
            Self::TableFull => write!(f, "process table full"),
            Self::InvalidState { pid } => write!(f, "process {} in wrong state", pid),
            Self::NoCurrent => write!(f, "no process is running"),
            Self::InvalidConfig => write!(f, "invalid scheduler configuration"),
        }
    }
}

impl SchedError {
    /// `NotFound` is a normal negative answer, not a fault. Callers use this
    /// to keep it out of the warning log.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Invariant check for the scheduling data model. A failure means the
/// process table or the ready queues are corrupt; there is no recovery.
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!("[SCHED CRITICAL] invariant violated: {}", format_args!($($arg)+));
        }
    };
}
