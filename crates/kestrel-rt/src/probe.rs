// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Hang probe: flags tasks that keep suspending without finishing.
//!
//! Complements the watchdog. The watchdog catches code that never yields;
//! the probe catches tasks that yield forever.

use tracing::warn;

use crate::task::Task;

#[derive(Debug, Clone, Copy)]
pub struct HangProbe {
    threshold: u64,
}

impl HangProbe {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// Called after each suspension. Warns on every multiple of the
    /// threshold; returns whether it did.
    pub fn observe(&self, task: &Task) -> bool {
        let count = task.suspensions();
        if count == 0 || count % self.threshold != 0 {
            return false;
        }
        warn!(
            task = %task.id(),
            unit = task.name(),
            suspensions = count,
            "hang probe: task keeps suspending without completing"
        );
        true
    }
}
