// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Loop clock.
//!
//! Deadlines are durations since the loop's epoch. The monotonic clock
//! follows wall time and blocks the loop thread while idle; the virtual
//! clock jumps straight to the next deadline.

use std::time::{Duration, Instant};

/// Longest single idle sleep, so an abort request is noticed promptly.
const IDLE_SLICE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockMode {
    #[default]
    Monotonic,
    Virtual,
}

impl ClockMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monotonic" | "realtime" | "wall" => Some(ClockMode::Monotonic),
            "virtual" | "offline" => Some(ClockMode::Virtual),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Clock {
    mode: ClockMode,
    epoch: Instant,
    virtual_now: Duration,
}

impl Clock {
    pub fn new(mode: ClockMode) -> Self {
        Self {
            mode,
            epoch: Instant::now(),
            virtual_now: Duration::ZERO,
        }
    }

    pub fn now(&self) -> Duration {
        match self.mode {
            ClockMode::Monotonic => self.epoch.elapsed(),
            ClockMode::Virtual => self.virtual_now,
        }
    }

    /// Wait for at most one idle slice towards `deadline`. Returns true once
    /// the deadline has been reached.
    pub fn idle_toward(&mut self, deadline: Duration) -> bool {
        match self.mode {
            ClockMode::Virtual => {
                if deadline > self.virtual_now {
                    self.virtual_now = deadline;
                }
                true
            }
            ClockMode::Monotonic => {
                let now = self.now();
                if now >= deadline {
                    return true;
                }
                std::thread::sleep((deadline - now).min(IDLE_SLICE));
                self.now() >= deadline
            }
        }
    }
}
