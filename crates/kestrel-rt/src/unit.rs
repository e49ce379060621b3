// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Suspendable units.
//!
//! A unit is hosted code compiled down to an explicit state machine. The
//! loop drives it through `step` alone; the unit keeps its own locals
//! between steps and never schedules itself.

use crate::context::Cx;
use crate::error::AppError;
use crate::sleep::Sleep;
use crate::task::TaskId;
use crate::value::Value;

/// What a unit is resumed with.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    /// First step; nothing to deliver.
    Start,
    /// Result of the awaited sleep or task.
    Value(Value),
    /// Error raised by an awaited task, injected at the suspension point.
    Error(AppError),
}

/// A pending suspension. A suspended unit carries exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Sleep(Sleep),
    /// Wait for another task of the same loop to finish.
    Join(TaskId),
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Suspend(Request),
    Done(Value),
    Failed(AppError),
}

impl Step {
    pub fn done(value: impl Into<Value>) -> Self {
        Step::Done(value.into())
    }

    pub fn fail(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Step::Failed(AppError::new(kind, message))
    }

    pub fn join(task: TaskId) -> Self {
        Step::Suspend(Request::Join(task))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Step::Suspend(_))
    }
}

impl From<Sleep> for Request {
    fn from(sleep: Sleep) -> Self {
        Request::Sleep(sleep)
    }
}

impl From<Sleep> for Step {
    fn from(sleep: Sleep) -> Self {
        Step::Suspend(Request::Sleep(sleep))
    }
}

impl From<Result<Value, AppError>> for Step {
    fn from(outcome: Result<Value, AppError>) -> Self {
        match outcome {
            Ok(v) => Step::Done(v),
            Err(e) => Step::Failed(e),
        }
    }
}

pub trait Unit {
    fn step(&mut self, cx: &mut Cx<'_>, resume: Resume) -> Step;

    /// Name used in diagnostics (watchdog reports, hang probe, traces).
    fn name(&self) -> &str {
        "unit"
    }
}

impl<U: Unit + ?Sized> Unit for Box<U> {
    fn step(&mut self, cx: &mut Cx<'_>, resume: Resume) -> Step {
        (**self).step(cx, resume)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Unit backed by a closure. The closure owns the state machine's locals.
pub struct FnUnit<F> {
    name: String,
    f: F,
}

impl<F> Unit for FnUnit<F>
where
    F: FnMut(&mut Cx<'_>, Resume) -> Step,
{
    fn step(&mut self, cx: &mut Cx<'_>, resume: Resume) -> Step {
        (self.f)(cx, resume)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnUnit<F>
where
    F: FnMut(&mut Cx<'_>, Resume) -> Step,
{
    FnUnit {
        name: name.into(),
        f,
    }
}
