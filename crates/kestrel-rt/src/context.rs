// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Loop identity and the per-step unit context.
//!
//! The active loop is published in a thread-scoped slot for the dynamic
//! extent of one run. `LoopScope` owns the slot: entering fails if a loop
//! is already active, and dropping the scope always clears it.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::MisuseError;
use crate::task::TaskId;
use crate::unit::Unit;

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u64);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop-{}", self.0)
    }
}

/// Identifies one run. Unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopHandle {
    id: LoopId,
}

impl LoopHandle {
    pub(crate) fn fresh() -> Self {
        Self {
            id: LoopId(NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn id(&self) -> LoopId {
        self.id
    }
}

impl fmt::Display for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

thread_local! {
    static CURRENT: Cell<Option<LoopHandle>> = const { Cell::new(None) };
}

/// The loop driving the calling code.
///
/// Fails with `NoRunningLoop` outside a run; never returns a stale handle.
pub fn current_loop() -> Result<LoopHandle, MisuseError> {
    CURRENT.with(|c| c.get()).ok_or(MisuseError::NoRunningLoop)
}

/// True while a run is active on this thread.
pub fn loop_active() -> bool {
    CURRENT.with(|c| c.get().is_some())
}

/// Publishes a loop identity until dropped.
///
/// Not `Send`: the scope must be released on the thread that entered it.
#[derive(Debug)]
pub struct LoopScope {
    handle: LoopHandle,
    _not_send: PhantomData<*const ()>,
}

impl LoopScope {
    pub fn enter(handle: LoopHandle) -> Result<Self, MisuseError> {
        CURRENT.with(|c| {
            if c.get().is_some() {
                return Err(MisuseError::LoopAlreadyRunning);
            }
            c.set(Some(handle));
            Ok(Self {
                handle,
                _not_send: PhantomData,
            })
        })
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle
    }
}

impl Drop for LoopScope {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(None));
    }
}

/// What a unit can see of the loop while it is being stepped.
pub struct Cx<'a> {
    handle: LoopHandle,
    task: TaskId,
    now: Duration,
    abort: &'a AtomicBool,
    spawned: &'a mut Vec<(TaskId, Box<dyn Unit>)>,
    next_task: &'a mut u64,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(
        handle: LoopHandle,
        task: TaskId,
        now: Duration,
        abort: &'a AtomicBool,
        spawned: &'a mut Vec<(TaskId, Box<dyn Unit>)>,
        next_task: &'a mut u64,
    ) -> Self {
        Self {
            handle,
            task,
            now,
            abort,
            spawned,
            next_task,
        }
    }

    pub fn loop_handle(&self) -> LoopHandle {
        self.handle
    }

    /// The task being stepped.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Loop time when this step started.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Set once the watchdog has given up on this run. Long-running units
    /// may poll it to stop early.
    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Start a sibling task. It becomes ready on the next turn; join it with
    /// `Step::join`.
    pub fn spawn(&mut self, unit: impl Unit + 'static) -> TaskId {
        let id = TaskId(*self.next_task);
        *self.next_task += 1;
        self.spawned.push((id, Box::new(unit)));
        id
    }
}
