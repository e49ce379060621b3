// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tasks: the scheduler-side wrapper around one unit.
//!
//! Created → Running → (Suspended ⇄ Running)* → Completed | Failed.
//! The outcome is written once and handed to every awaiter.

use std::fmt;

use crate::context::Cx;
use crate::error::AppError;
use crate::unit::{Resume, Step, Unit};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Spawned, never stepped.
    Created,
    /// Inside `step`.
    Running,
    /// Parked on a sleep or join.
    Suspended,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

pub struct Task {
    id: TaskId,
    name: String,
    unit: Box<dyn Unit>,
    state: TaskState,
    outcome: Option<Result<Value, AppError>>,
    awaiters: Vec<TaskId>,
    /// Suspensions since the task started. Read by the hang probe.
    suspensions: u64,
    /// Someone joined this task or took its outcome.
    retrieved: bool,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("awaiters", &self.awaiters)
            .finish()
    }
}

impl Task {
    pub fn new(id: TaskId, unit: Box<dyn Unit>) -> Self {
        let name = unit.name().to_string();
        Self {
            id,
            name,
            unit,
            state: TaskState::Created,
            outcome: None,
            awaiters: Vec::new(),
            suspensions: 0,
            retrieved: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn suspensions(&self) -> u64 {
        self.suspensions
    }

    pub fn outcome(&self) -> Option<&Result<Value, AppError>> {
        self.outcome.as_ref()
    }

    /// Step the unit once. A terminal task is never stepped again; its
    /// recorded outcome is returned instead.
    pub fn step(&mut self, cx: &mut Cx<'_>, resume: Resume) -> Step {
        if let Some(outcome) = &self.outcome {
            return outcome.clone().into();
        }

        self.state = TaskState::Running;
        let step = self.unit.step(cx, resume);
        match &step {
            Step::Suspend(_) => {
                self.state = TaskState::Suspended;
                self.suspensions += 1;
            }
            Step::Done(v) => {
                self.state = TaskState::Completed;
                self.outcome = Some(Ok(v.clone()));
            }
            Step::Failed(e) => {
                self.state = TaskState::Failed;
                self.outcome = Some(Err(e.clone()));
            }
        }
        step
    }

    pub fn add_awaiter(&mut self, waiter: TaskId) {
        self.retrieved = true;
        self.awaiters.push(waiter);
    }

    pub fn mark_retrieved(&mut self) {
        self.retrieved = true;
    }

    /// A failed task whose error nobody joined for.
    pub fn unretrieved_error(&self) -> Option<&AppError> {
        match &self.outcome {
            Some(Err(e)) if !self.retrieved => Some(e),
            _ => None,
        }
    }

    /// Hand over the current awaiters; each is woken exactly once.
    pub fn take_awaiters(&mut self) -> Vec<TaskId> {
        std::mem::take(&mut self.awaiters)
    }

    /// The resume value an awaiter receives, once the task is terminal.
    pub fn resume_for_awaiter(&self) -> Option<Resume> {
        self.outcome.as_ref().map(|outcome| match outcome {
            Ok(v) => Resume::Value(v.clone()),
            Err(e) => Resume::Error(e.clone()),
        })
    }
}
