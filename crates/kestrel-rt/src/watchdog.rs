// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Hang watchdog.
//!
//! Hosted code may spin without ever yielding, so the loop cannot police
//! itself. The watchdog moves the loop onto its own thread and waits for the
//! result with a deadline. On expiry it raises the abort flag and reports
//! what the loop was doing, read from the heartbeat. It never touches the
//! loop's queues.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::RunError;
use crate::task::TaskId;

/// Lifetime metadata the loop publishes for the watchdog.
#[derive(Debug)]
pub struct Heartbeat {
    inner: Mutex<Activity>,
}

#[derive(Debug, Clone)]
struct Activity {
    /// Task being stepped, if any.
    task: Option<(TaskId, String)>,
    /// When the current step started, or when the loop last went idle.
    since: Instant,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Activity {
                task: None,
                since: Instant::now(),
            }),
        }
    }

    pub fn enter(&self, task: TaskId, name: &str) {
        let mut a = self.inner.lock().unwrap();
        a.task = Some((task, name.to_string()));
        a.since = Instant::now();
    }

    pub fn leave(&self) {
        let mut a = self.inner.lock().unwrap();
        a.task = None;
        a.since = Instant::now();
    }

    fn report(&self, limit: Duration) -> HangReport {
        let a = self.inner.lock().unwrap().clone();
        let (task, unit) = match a.task {
            Some((id, name)) => (Some(id), Some(name)),
            None => (None, None),
        };
        HangReport {
            task,
            unit,
            stalled_for: a.since.elapsed(),
            limit,
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnostic for an aborted run.
#[derive(Debug, Clone, PartialEq)]
pub struct HangReport {
    /// Task that was inside a step when the deadline passed.
    pub task: Option<TaskId>,
    pub unit: Option<String>,
    /// How long that task had gone without yielding (or the loop had idled).
    pub stalled_for: Duration,
    pub limit: Duration,
}

impl fmt::Display for HangReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.task, &self.unit) {
            (Some(task), Some(unit)) => write!(
                f,
                "hang watchdog: {} ({}) has not yielded for {:.3}s (limit {:.3}s)",
                task,
                unit,
                self.stalled_for.as_secs_f64(),
                self.limit.as_secs_f64()
            ),
            _ => write!(
                f,
                "hang watchdog: run exceeded {:.3}s; loop idle for {:.3}s",
                self.limit.as_secs_f64(),
                self.stalled_for.as_secs_f64()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    limit: Duration,
}

impl Watchdog {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Run `f` on a fresh thread and wait at most `limit` for it.
    ///
    /// On timeout the abort flag is raised, the thread is left behind and
    /// the result is `RunError::Hang`; a loop that yields again will see the
    /// flag and stop. A panic on the loop thread is re-raised here.
    pub fn race<T, F>(&self, heartbeat: &Heartbeat, abort: &AtomicBool, f: F) -> Result<T, RunError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name("kestrel-loop".to_string())
            .spawn(move || {
                let _ = tx.send(f());
            })
            .map_err(|e| RunError::Spawn(Arc::new(e)))?;

        match rx.recv_timeout(self.limit) {
            Ok(value) => {
                let _ = handle.join();
                Ok(value)
            }
            Err(RecvTimeoutError::Timeout) => {
                abort.store(true, Ordering::Release);
                let report = heartbeat.report(self.limit);
                warn!(
                    task = ?report.task,
                    unit = report.unit.as_deref().unwrap_or("-"),
                    stalled_ms = millis(report.stalled_for),
                    limit_ms = millis(self.limit),
                    "watchdog aborting run"
                );
                drop(handle);
                Err(RunError::Hang(report))
            }
            Err(RecvTimeoutError::Disconnected) => match handle.join() {
                Err(payload) => {
                    debug!("loop thread panicked; re-raising on caller");
                    std::panic::resume_unwind(payload)
                }
                Ok(()) => unreachable!("loop thread exits only after sending its result"),
            },
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_work_is_unaffected() {
        let hb = Heartbeat::new();
        let abort = AtomicBool::new(false);
        let out = Watchdog::new(Duration::from_secs(5)).race(&hb, &abort, || 42);
        assert_eq!(out.unwrap(), 42);
        assert!(!abort.load(Ordering::Acquire));
    }

    #[test]
    fn slow_work_is_reported() {
        let hb = Heartbeat::new();
        hb.enter(TaskId(3), "spinner");
        let abort = AtomicBool::new(false);
        let err = Watchdog::new(Duration::from_millis(30))
            .race(&hb, &abort, || std::thread::sleep(Duration::from_millis(500)))
            .unwrap_err();
        let RunError::Hang(report) = err else {
            panic!("expected hang, got {err:?}");
        };
        assert!(abort.load(Ordering::Acquire));
        assert_eq!(report.task, Some(TaskId(3)));
        assert_eq!(report.unit.as_deref(), Some("spinner"));
        assert!(report.stalled_for >= Duration::from_millis(30));
        assert!(report.to_string().contains("task-3 (spinner) has not yielded"));
    }

    #[test]
    fn idle_loop_report() {
        let hb = Heartbeat::new();
        hb.leave();
        let report = hb.report(Duration::from_secs(1));
        assert_eq!(report.task, None);
        assert!(report.to_string().contains("loop idle"));
    }

    #[test]
    fn panics_are_re_raised() {
        let hb = Heartbeat::new();
        let abort = AtomicBool::new(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Watchdog::new(Duration::from_secs(5)).race(&hb, &abort, || -> u8 { panic!("unit blew up") })
        }));
        assert!(result.is_err());
    }
}
