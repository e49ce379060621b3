// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The sleep primitive.
//!
//! Awaiting a `Sleep` always suspends exactly once, even for a zero or
//! negative delay, and resumes with the carried result (`None` by default).

use std::time::Duration;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Sleep {
    delay: Duration,
    result: Value,
}

/// Sleep for `delay` seconds. Negative, NaN and infinite delays count as zero.
pub fn sleep(delay: f64) -> Sleep {
    Sleep::from_duration(clamp_delay(delay))
}

fn clamp_delay(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl Sleep {
    pub fn from_duration(delay: Duration) -> Self {
        Self {
            delay,
            result: Value::None,
        }
    }

    /// Value delivered to the awaiting point when the sleep fires.
    pub fn with_result(mut self, result: impl Into<Value>) -> Self {
        self.result = result.into();
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Deadline relative to the loop epoch. Saturates instead of overflowing.
    pub fn deadline_from(&self, now: Duration) -> Duration {
        now.checked_add(self.delay).unwrap_or(Duration::MAX)
    }

    pub(crate) fn into_result(self) -> Value {
        self.result
    }
}
