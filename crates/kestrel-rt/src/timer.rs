// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Timer queue ordered by (deadline, insertion sequence).
//!
//! Equal deadlines pop in registration order. The carried value never takes
//! part in the ordering.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::task::TaskId;
use crate::value::Value;

/// A pending wakeup.
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub deadline: Duration,
    pub seq: u64,
    pub task: TaskId,
    pub value: Value,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap; reversed so the earliest (deadline, seq) is on top.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
            .reverse()
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wakeup. Returns its sequence number.
    pub fn push(&mut self, deadline: Duration, task: TaskId, value: Value) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TimerEntry {
            deadline,
            seq,
            task,
            value,
        });
        seq
    }

    /// Pop the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<TimerEntry> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop()
    }

    /// Pop every entry due at `now`, in order.
    pub fn drain_due(&mut self, now: Duration) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        while let Some(entry) = self.pop_due(now) {
            due.push(entry);
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.deadline)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
