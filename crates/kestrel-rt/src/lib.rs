// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Kestrel runtime: a cooperative single-threaded event loop.
//!
//! Units of hosted code are explicit state machines stepped by the loop.
//! They suspend only by sleeping (or joining another task), and the loop
//! resumes them turn by turn in a fixed FIFO order.
//!
//! Components:
//! - unit/task - suspendable computations and their scheduler wrapper
//! - timer/sleep/clock - deadline ordering and the sleep primitive
//! - scheduler - ready queue, timer queue, turn loop
//! - context - loop identity (`current_loop`) and the per-step `Cx`
//! - run - the entry point that owns one loop for one call
//! - watchdog/probe - liveness guards against code that never yields
//! - config - environment-driven run configuration

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod probe;
pub mod run;
pub mod scheduler;
pub mod sleep;
pub mod task;
pub mod timer;
pub mod unit;
pub mod value;
pub mod watchdog;

pub use clock::ClockMode;
pub use config::RunConfig;
pub use context::{current_loop, Cx, LoopHandle, LoopId};
pub use error::{AppError, MisuseError, RunError};
pub use run::{run, Runner};
pub use scheduler::EventLoop;
pub use sleep::{sleep, Sleep};
pub use task::{TaskId, TaskState};
pub use unit::{from_fn, Request, Resume, Step, Unit};
pub use value::Value;
pub use watchdog::HangReport;
