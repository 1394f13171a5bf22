//! # Ready Queues
//!
//! One FIFO run queue per priority level. Queues hold process table slots,
//! never copies of records, and each is a fixed ring sized for the whole
//! table so enqueueing cannot fail for lack of memory.
//!
//! A slot is linked into at most one queue at a time. Moving a process to a
//! different level is always [`ReadyQueues::remove`] followed by
//! [`ReadyQueues::enqueue`]; the level is never rewritten while linked.

use crate::config::{NPROC, NUM_QUEUES};
use crate::proc::{QueueLevel, Slot};
use crate::sched_assert;

// ---------------------------------------------------------------------------
// Single run queue
// ---------------------------------------------------------------------------

/// Bounded FIFO of slots.
#[derive(Clone, Copy)]
pub struct RunQueue {
    ring: [Slot; NPROC],
    head: usize,
    len: usize,
}

impl RunQueue {
    pub const EMPTY: Self = Self {
        ring: [0; NPROC],
        head: 0,
        len: 0,
    };

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn at(&self, i: usize) -> Slot {
        self.ring[(self.head + i) % NPROC]
    }

    fn push_back(&mut self, slot: Slot) {
        sched_assert!(self.len < NPROC, "run queue overflow pushing slot {}", slot);
        let tail = (self.head + self.len) % NPROC;
        self.ring[tail] = slot;
        self.len += 1;
    }

    fn pop_front(&mut self) -> Option<Slot> {
        if self.len == 0 {
            return None;
        }
        let slot = self.ring[self.head];
        self.head = (self.head + 1) % NPROC;
        self.len -= 1;
        Some(slot)
    }

    fn position(&self, slot: Slot) -> Option<usize> {
        (0..self.len).find(|&i| self.at(i) == slot)
    }

    /// Unlink the entry at logical index `i`, closing the gap so the
    /// remaining entries keep their arrival order.
    fn remove_at(&mut self, i: usize) {
        for j in i..self.len - 1 {
            let next = self.at(j + 1);
            self.ring[(self.head + j) % NPROC] = next;
        }
        self.len -= 1;
    }

    /// Slots from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        (0..self.len).map(move |i| self.at(i))
    }
}

// ---------------------------------------------------------------------------
// Level-indexed queue set
// ---------------------------------------------------------------------------

pub struct ReadyQueues {
    queues: [RunQueue; NUM_QUEUES],
}

impl ReadyQueues {
    pub const fn new() -> Self {
        Self {
            queues: [RunQueue::EMPTY; NUM_QUEUES],
        }
    }

    /// Append `slot` to the tail of `level`.
    ///
    /// Linking a slot that is already queued anywhere is corruption and
    /// halts the scheduler.
    pub fn enqueue(&mut self, slot: Slot, level: QueueLevel) {
        if let Some(found) = self.level_of(slot) {
            sched_assert!(
                false,
                "slot {} enqueued on level {} while linked on level {}",
                slot,
                level.index(),
                found.index()
            );
        }
        self.queues[level.index()].push_back(slot);
    }

    /// Remove and return the head of `level`.
    pub fn dequeue_head(&mut self, level: QueueLevel) -> Option<Slot> {
        self.queues[level.index()].pop_front()
    }

    /// Unlink `slot` from whichever queue holds it. Returns the level it was
    /// found on; a slot that is not queued is left alone.
    pub fn remove(&mut self, slot: Slot) -> Option<QueueLevel> {
        for level in QueueLevel::ALL {
            let queue = &mut self.queues[level.index()];
            if let Some(i) = queue.position(slot) {
                queue.remove_at(i);
                return Some(level);
            }
        }
        None
    }

    /// Level whose queue currently links `slot`.
    pub fn level_of(&self, slot: Slot) -> Option<QueueLevel> {
        QueueLevel::ALL
            .into_iter()
            .find(|level| self.queues[level.index()].position(slot).is_some())
    }

    #[inline]
    pub fn queue(&self, level: QueueLevel) -> &RunQueue {
        &self.queues[level.index()]
    }

    pub fn total_len(&self) -> usize {
        self.queues.iter().map(RunQueue::len).sum()
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}
