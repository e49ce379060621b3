// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Run entry point.
//!
//! Each call gets a fresh loop, publishes it as the current loop, drives the
//! root unit to completion and tears the loop down. Nested calls on the same
//! thread fail with a misuse error instead of nesting.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::debug;

use crate::config::RunConfig;
use crate::context::loop_active;
use crate::error::{MisuseError, RunError};
use crate::scheduler::EventLoop;
use crate::unit::Unit;
use crate::value::Value;
use crate::watchdog::{millis, Heartbeat, Watchdog};

/// Run `unit` on the calling thread with the default configuration.
///
/// The environment is not read, so `KESTREL_HANG_TIMEOUT` and the other
/// settings have no effect here and no watchdog is armed. Use
/// [`Runner::from_env`] to honor them.
pub fn run(unit: impl Unit + 'static) -> Result<Value, RunError> {
    EventLoop::new(&RunConfig::default()).run_until_complete(unit)
}

/// Runs units under a fixed configuration, including the hang watchdog.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(RunConfig::from_env())
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `unit` to completion.
    ///
    /// With the watchdog armed the loop runs on its own thread and the call
    /// returns `RunError::Hang` once the limit passes. The calling thread's
    /// loop identity is never set in that mode, so it is clear on every exit.
    pub fn run<U>(&self, unit: U) -> Result<Value, RunError>
    where
        U: Unit + Send + 'static,
    {
        let Some(limit) = self.config.hang_timeout else {
            return EventLoop::new(&self.config).run_until_complete(unit);
        };

        // The loop thread has its own identity slot; check ours here.
        if loop_active() {
            return Err(MisuseError::LoopAlreadyRunning.into());
        }

        let abort = Arc::new(AtomicBool::new(false));
        let heartbeat = Arc::new(Heartbeat::new());
        let config = self.config.clone();
        let (loop_abort, loop_heartbeat) = (abort.clone(), heartbeat.clone());

        debug!(limit_ms = millis(limit), "watchdog armed");
        Watchdog::new(limit)
            .race(&heartbeat, &abort, move || {
                EventLoop::with_signals(&config, loop_abort, loop_heartbeat).run_until_complete(unit)
            })
            .and_then(|outcome| outcome)
    }
}
