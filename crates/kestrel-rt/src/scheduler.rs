// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The event loop.
//!
//! One loop owns a ready queue and a timer queue and steps tasks turn by
//! turn on the calling thread. A turn takes every due timer (deadline,
//! then registration order), then every task that became ready directly,
//! and steps each exactly once. Work made ready during a turn waits for the
//! next one.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::config::RunConfig;
use crate::context::{Cx, LoopHandle, LoopScope};
use crate::error::{AppError, RunError};
use crate::probe::HangProbe;
use crate::task::{Task, TaskId, TaskState};
use crate::timer::TimerQueue;
use crate::unit::{Request, Resume, Step, Unit};
use crate::value::Value;
use crate::watchdog::Heartbeat;

pub struct EventLoop {
    handle: LoopHandle,
    clock: Clock,
    tasks: HashMap<TaskId, Task>,
    /// Tasks ready without a timer: fresh spawns and woken awaiters.
    ready: VecDeque<(TaskId, Resume)>,
    timers: TimerQueue,
    /// Spawns requested by the unit currently being stepped.
    spawned: Vec<(TaskId, Box<dyn Unit>)>,
    next_task: u64,
    turns: u64,
    abort: Arc<AtomicBool>,
    heartbeat: Arc<Heartbeat>,
    probe: Option<HangProbe>,
}

impl EventLoop {
    pub fn new(config: &RunConfig) -> Self {
        Self::with_signals(
            config,
            Arc::new(AtomicBool::new(false)),
            Arc::new(Heartbeat::new()),
        )
    }

    /// Build a loop that shares its abort flag and heartbeat with a watchdog.
    pub fn with_signals(config: &RunConfig, abort: Arc<AtomicBool>, heartbeat: Arc<Heartbeat>) -> Self {
        Self {
            handle: LoopHandle::fresh(),
            clock: Clock::new(config.clock),
            tasks: HashMap::new(),
            ready: VecDeque::new(),
            timers: TimerQueue::new(),
            spawned: Vec::new(),
            next_task: 1,
            turns: 0,
            abort,
            heartbeat,
            probe: config.hang_probe.map(HangProbe::new),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(|t| t.state())
    }

    pub fn outcome(&self, id: TaskId) -> Option<&Result<Value, AppError>> {
        self.tasks.get(&id).and_then(|t| t.outcome())
    }

    /// Register a task. It is stepped for the first time on the next turn.
    pub fn spawn(&mut self, unit: impl Unit + 'static) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        self.admit(id, Box::new(unit));
        id
    }

    fn admit(&mut self, id: TaskId, unit: Box<dyn Unit>) {
        let task = Task::new(id, unit);
        trace!(task = %id, unit = task.name(), "spawned");
        self.tasks.insert(id, task);
        self.ready.push_back((id, Resume::Start));
    }

    fn admit_spawned(&mut self) {
        for (id, unit) in std::mem::take(&mut self.spawned) {
            self.admit(id, unit);
        }
    }

    /// Run one turn. Returns the number of tasks stepped.
    pub fn run_turn(&mut self) -> usize {
        self.turns += 1;
        let now = self.clock.now();

        let mut batch: VecDeque<(TaskId, Resume)> = self
            .timers
            .drain_due(now)
            .into_iter()
            .map(|entry| (entry.task, Resume::Value(entry.value)))
            .collect();
        let due = batch.len();
        batch.extend(self.ready.drain(..));
        trace!(turn = self.turns, due, batch = batch.len(), "starting turn");

        let mut steps = 0;
        for (id, resume) in batch {
            if self.abort.load(Ordering::Acquire) {
                debug!(turn = self.turns, "abort requested; stopping turn");
                break;
            }
            if self.step_task(id, resume) {
                steps += 1;
            }
        }
        steps
    }

    /// Step one task. Returns false if the task was missing or terminal.
    fn step_task(&mut self, id: TaskId, resume: Resume) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        if task.state().is_terminal() {
            trace!(task = %id, "skipping finished task");
            return false;
        }

        self.heartbeat.enter(id, task.name());
        let step = {
            let mut cx = Cx::new(
                self.handle,
                id,
                now,
                &self.abort,
                &mut self.spawned,
                &mut self.next_task,
            );
            task.step(&mut cx, resume)
        };
        self.heartbeat.leave();

        if let (Step::Suspend(_), Some(probe)) = (&step, &self.probe) {
            probe.observe(task);
        }

        self.admit_spawned();

        match step {
            Step::Suspend(Request::Sleep(sleep)) => {
                let deadline = sleep.deadline_from(self.clock.now());
                let seq = self.timers.push(deadline, id, sleep.into_result());
                let deadline_us = u64::try_from(deadline.as_micros()).unwrap_or(u64::MAX);
                trace!(task = %id, deadline_us, seq, "sleeping");
            }
            Step::Suspend(Request::Join(target)) => self.join(id, target),
            Step::Done(_) | Step::Failed(_) => self.finish(id),
        }
        true
    }

    fn join(&mut self, waiter: TaskId, target: TaskId) {
        if waiter == target {
            let err = AppError::runtime(format!("{} cannot await on itself", waiter));
            self.ready.push_back((waiter, Resume::Error(err)));
            return;
        }
        let Some(task) = self.tasks.get_mut(&target) else {
            let err = AppError::runtime(format!("unknown {}", target));
            self.ready.push_back((waiter, Resume::Error(err)));
            return;
        };
        match task.resume_for_awaiter() {
            Some(resume) => {
                task.mark_retrieved();
                self.ready.push_back((waiter, resume));
            }
            None => {
                trace!(task = %waiter, target = %target, "joining");
                task.add_awaiter(waiter);
            }
        }
    }

    /// Deliver a terminal outcome to everyone waiting on it.
    fn finish(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        debug!(task = %id, unit = task.name(), state = ?task.state(), "task finished");
        let awaiters = task.take_awaiters();
        let Some(resume) = task.resume_for_awaiter() else {
            return;
        };
        for waiter in awaiters {
            self.ready.push_back((waiter, resume.clone()));
        }
    }

    /// Warn about failed tasks nobody joined.
    fn report_unretrieved(&self) {
        let mut failed: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.unretrieved_error().is_some())
            .collect();
        failed.sort_by_key(|t| t.id());
        for task in failed {
            if let Some(err) = task.unretrieved_error() {
                warn!(
                    task = %task.id(),
                    unit = task.name(),
                    kind = err.kind(),
                    message = %err.message,
                    "task error was never retrieved"
                );
            }
        }
    }

    fn unfinished(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| !t.state().is_terminal())
            .count()
    }

    /// Drive `root` to completion and return its outcome.
    ///
    /// Publishes this loop as the current loop for the duration of the call.
    /// Fails with a misuse error, before stepping anything, if another loop
    /// is already active on this thread.
    pub fn run_until_complete(&mut self, root: impl Unit + 'static) -> Result<Value, RunError> {
        let _scope = LoopScope::enter(self.handle)?;
        let root = self.spawn(root);
        if let Some(task) = self.tasks.get_mut(&root) {
            // The caller receives the root's outcome.
            task.mark_retrieved();
        }
        debug!(run = %self.handle, root = %root, "run started");

        loop {
            if self.abort.load(Ordering::Acquire) {
                return Err(RunError::Aborted);
            }
            if self.task_state(root).is_some_and(TaskState::is_terminal) {
                break;
            }
            if self.run_turn() > 0 || !self.ready.is_empty() {
                continue;
            }
            match self.timers.next_deadline() {
                Some(deadline) => {
                    self.clock.idle_toward(deadline);
                }
                None => {
                    self.report_unretrieved();
                    return Err(RunError::Deadlock {
                        pending: self.unfinished(),
                    });
                }
            }
        }

        let orphans = self.unfinished();
        if orphans > 0 {
            debug!(run = %self.handle, orphans, "dropping unfinished tasks");
        }
        self.report_unretrieved();
        debug!(run = %self.handle, turns = self.turns, "run finished");

        match self.outcome(root) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(e)) => Err(RunError::App(e.clone())),
            None => Err(RunError::Deadlock { pending: orphans }),
        }
    }
}
