//! # mlfq-sched: Multi-Level Feedback Queue Scheduler
//!
//! The process scheduler of a small teaching kernel, together with the
//! snapshot ABI that monitoring tools read.
//!
//! ## Overview
//!
//! Three ready queues with time slices of 1, 2 and 4 ticks. New processes
//! start in queue 0. Behavior decides where they go from there:
//!
//! - **CPU-bound work sinks**: a process that uses its whole slice is moved
//!   one queue down
//! - **I/O-bound work stays responsive**: a process that blocks before its
//!   slice is used up keeps its queue
//! - **Nobody starves**: every `boost_interval` ticks all runnable processes
//!   are moved back to queue 0
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │        Timer ISR · process lifecycle · syscalls         │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   on_timer_tick() · reschedule() · getpstat/getpinfo    │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Policy           │  Snapshot         │
//! │  scheduler.rs│   policy.rs        │  snapshot.rs      │
//! │  ─ tick()    │   ─ boost_all()    │  ─ PStat          │
//! │  ─ schedule()│   ─ charge_slice() │  ─ ProcInfo       │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │   Process table (proc.rs)  ·  Ready queues (queue.rs)   │
//! ├────────────────────────────────────────────────────────┤
//! │      Critical section (sync.rs) · idle (arch/)          │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: the process table and queues are fixed arrays of `NPROC`
//! - **Single writer**: [`scheduler::Scheduler`] methods take `&mut self`;
//!   the one global instance lives behind a critical section in
//!   [`kernel`]
//! - **Snapshots by value**: readers get a copy and never hold the lock
//!   while rendering it

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod error;
pub mod proc;
pub mod queue;
pub mod policy;
pub mod scheduler;
pub mod snapshot;
pub mod arch;
pub mod kernel;
pub mod sync;

pub use config::SchedConfig;
pub use error::{SchedError, SchedResult};
pub use proc::{Pid, ProcSchedState, ProcState, QueueLevel, WaitChannel};
pub use scheduler::Scheduler;
pub use snapshot::{LegacySnapshot, MlfqStat, PStat, ProcInfo, ProcStat};
