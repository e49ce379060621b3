// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error taxonomy for runs.
//!
//! Application errors belong to hosted code and travel verbatim. Misuse
//! errors mean the runtime API was used wrong. A watchdog abort is neither:
//! hosted code never observes it.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::watchdog::HangReport;

/// Kind name reported for misuse errors, matching the reference runtime.
pub const MISUSE_KIND: &str = "RuntimeError";

/// An error raised by hosted code. The kind is the hosted exception's type
/// name; consumers match on it, so it is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", suffix(.message))]
pub struct AppError {
    pub kind: String,
    pub message: String,
}

fn suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

impl AppError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(MISUSE_KIND, message)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Wrong use of the loop API. Raised synchronously at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MisuseError {
    #[error("no running event loop")]
    NoRunningLoop,

    #[error("run() cannot be called from a running event loop")]
    LoopAlreadyRunning,
}

impl MisuseError {
    pub fn kind(&self) -> &'static str {
        MISUSE_KIND
    }
}

/// Hosted code that catches a misuse error sees it as an ordinary
/// `RuntimeError`, as it would under the reference runtime.
impl From<MisuseError> for AppError {
    fn from(e: MisuseError) -> Self {
        AppError::new(e.kind(), e.to_string())
    }
}

/// Why a run did not produce a value.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Misuse(#[from] MisuseError),

    #[error("{0}")]
    Hang(HangReport),

    #[error("event loop aborted by watchdog")]
    Aborted,

    #[error("event loop stalled: {pending} unfinished task(s) and nothing scheduled")]
    Deadlock { pending: usize },

    #[error("failed to start the event loop thread")]
    Spawn(#[source] Arc<io::Error>),
}

impl RunError {
    /// Kind name as a consumer would print it.
    pub fn kind(&self) -> &str {
        match self {
            RunError::App(e) => e.kind(),
            RunError::Misuse(e) => e.kind(),
            RunError::Hang(_) | RunError::Aborted => "HangTimeout",
            RunError::Deadlock { .. } => MISUSE_KIND,
            RunError::Spawn(_) => "OSError",
        }
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, RunError::Misuse(_))
    }

    pub fn is_hang(&self) -> bool {
        matches!(self, RunError::Hang(_) | RunError::Aborted)
    }

    pub fn as_app(&self) -> Option<&AppError> {
        match self {
            RunError::App(e) => Some(e),
            _ => None,
        }
    }
}
