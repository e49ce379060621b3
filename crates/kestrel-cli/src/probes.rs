// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Built-in probes.
//!
//! Each probe is a small program with a known transcript (lines it prints)
//! and a known outcome (the repr of the returned value, or the error kind).
//! `check` compares what the runtime actually produces against both.

use std::fmt;
use std::sync::{Arc, Mutex};

use kestrel_rt::{current_loop, from_fn, run, sleep, RunError, Resume, Step, TaskId, Unit, Value};

pub type Transcript = Arc<Mutex<Vec<String>>>;
pub type BoxUnit = Box<dyn Unit + Send>;

fn say(out: &Transcript, line: impl Into<String>) {
    out.lock().unwrap().push(line.into());
}

/// What a run produced: printed lines plus a rendered outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub lines: Vec<String>,
    pub outcome: String,
}

impl Observed {
    pub fn new(lines: Vec<String>, result: &Result<Value, RunError>) -> Self {
        Self {
            lines,
            outcome: render(result),
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        write!(f, "=> {}", self.outcome)
    }
}

/// `Ok` values render as their repr, errors as `!Kind`.
pub fn render(result: &Result<Value, RunError>) -> String {
    match result {
        Ok(v) => v.to_string(),
        Err(e) => format!("!{}", e.kind()),
    }
}

pub struct Probe {
    pub name: &'static str,
    pub about: &'static str,
    pub lines: &'static [&'static str],
    pub outcome: &'static str,
    /// Only meaningful with the watchdog armed; otherwise it never returns.
    pub needs_watchdog: bool,
    build: fn(&Transcript) -> BoxUnit,
}

impl Probe {
    pub fn build(&self, out: &Transcript) -> BoxUnit {
        (self.build)(out)
    }

    pub fn expected(&self) -> Observed {
        Observed {
            lines: self.lines.iter().map(|l| l.to_string()).collect(),
            outcome: self.outcome.to_string(),
        }
    }
}

pub fn all() -> &'static [Probe] {
    PROBES
}

pub fn find(name: &str) -> Option<&'static Probe> {
    PROBES.iter().find(|p| p.name == name)
}

static PROBES: &[Probe] = &[
    Probe {
        name: "sleep_sum",
        about: "sum of range(10) with sleep(0) between iterations",
        lines: &[],
        outcome: "45",
        needs_watchdog: false,
        build: sleep_sum,
    },
    Probe {
        name: "print_order",
        about: "print(1); sleep(0); print(2)",
        lines: &["1", "2"],
        outcome: "None",
        needs_watchdog: false,
        build: print_order,
    },
    Probe {
        name: "sleep_result",
        about: "sleep(0, 3) + sleep(0.0, 4)",
        lines: &[],
        outcome: "7",
        needs_watchdog: false,
        build: sleep_result,
    },
    Probe {
        name: "current_loop",
        about: "loop identity outside and inside a run",
        lines: &["outside: RuntimeError", "inside: same loop"],
        outcome: "True",
        needs_watchdog: false,
        build: current_loop_probe,
    },
    Probe {
        name: "nested_run",
        about: "calling run() from inside a running unit",
        lines: &["nested: RuntimeError"],
        outcome: "!RuntimeError",
        needs_watchdog: false,
        build: nested_run,
    },
    Probe {
        name: "error_identity",
        about: "error raised after three suspensions keeps its kind",
        lines: &[],
        outcome: "!ZeroDivisionError",
        needs_watchdog: false,
        build: error_identity,
    },
    Probe {
        name: "timer_order",
        about: "children sleeping 30/10/20 ms wake in deadline order",
        lines: &["b", "c", "a"],
        outcome: "3",
        needs_watchdog: false,
        build: timer_order,
    },
    Probe {
        name: "fan_out",
        about: "join children in spawn order, results in spawn order",
        lines: &["fast woke", "slow woke"],
        outcome: "slow,fast",
        needs_watchdog: false,
        build: fan_out,
    },
    Probe {
        name: "spin",
        about: "never yields; the watchdog must abort it",
        lines: &["spinning"],
        outcome: "!HangTimeout",
        needs_watchdog: true,
        build: spin,
    },
];

fn sleep_sum(_out: &Transcript) -> BoxUnit {
    let (mut i, mut acc) = (0i64, 0i64);
    Box::new(from_fn("sleep_sum", move |_cx, resume| {
        match resume {
            Resume::Start => {}
            Resume::Value(_) => {
                acc += i;
                i += 1;
            }
            Resume::Error(e) => return Step::Failed(e),
        }
        if i < 10 {
            sleep(0.0).into()
        } else {
            Step::done(acc)
        }
    }))
}

fn print_order(out: &Transcript) -> BoxUnit {
    let out = out.clone();
    Box::new(from_fn("print_order", move |_cx, resume| match resume {
        Resume::Start => {
            say(&out, "1");
            sleep(0.0).into()
        }
        Resume::Value(_) => {
            say(&out, "2");
            Step::done(())
        }
        Resume::Error(e) => Step::Failed(e),
    }))
}

fn sleep_result(_out: &Transcript) -> BoxUnit {
    let mut first = None;
    Box::new(from_fn("sleep_result", move |_cx, resume| match resume {
        Resume::Start => sleep(0.0).with_result(3).into(),
        Resume::Value(v) => match first.take() {
            None => {
                first = Some(v);
                sleep(0.0).with_result(4).into()
            }
            Some(a) => {
                let sum = a.as_int().zip(v.as_int()).map(|(a, b)| a + b);
                match sum {
                    Some(sum) => Step::done(sum),
                    None => Step::fail("TypeError", "unsupported operand types"),
                }
            }
        },
        Resume::Error(e) => Step::Failed(e),
    }))
}

fn current_loop_probe(out: &Transcript) -> BoxUnit {
    match current_loop() {
        Ok(handle) => say(out, format!("outside: {}", handle.id())),
        Err(e) => say(out, format!("outside: {}", e.kind())),
    }
    let out = out.clone();
    Box::new(from_fn("current_loop", move |cx, _resume| {
        let same = current_loop().is_ok_and(|h| h == cx.loop_handle());
        say(&out, if same { "inside: same loop" } else { "inside: other loop" });
        Step::done(same)
    }))
}

fn nested_run(out: &Transcript) -> BoxUnit {
    let out = out.clone();
    Box::new(from_fn("nested_run", move |_cx, _resume| {
        match run(from_fn("inner", |_cx, _resume| Step::done(1))) {
            Err(RunError::Misuse(m)) => {
                say(&out, format!("nested: {}", m.kind()));
                Step::Failed(m.into())
            }
            other => {
                say(&out, format!("nested: {}", render(&other)));
                Step::done(())
            }
        }
    }))
}

fn error_identity(_out: &Transcript) -> BoxUnit {
    let mut suspensions = 0;
    Box::new(from_fn("error_identity", move |_cx, _resume| {
        if suspensions < 3 {
            suspensions += 1;
            return sleep(0.0).into();
        }
        Step::fail("ZeroDivisionError", "division by zero")
    }))
}

fn timer_order(out: &Transcript) -> BoxUnit {
    let out = out.clone();
    let mut children: Vec<TaskId> = Vec::new();
    let mut joined = 0;
    Box::new(from_fn("timer_order", move |cx, resume| {
        match resume {
            Resume::Start => {
                for (tag, delay) in [("a", 0.03), ("b", 0.01), ("c", 0.02)] {
                    let out = out.clone();
                    children.push(cx.spawn(from_fn(tag, move |_cx, resume| match resume {
                        Resume::Start => sleep(delay).into(),
                        _ => {
                            say(&out, tag);
                            Step::done(())
                        }
                    })));
                }
            }
            Resume::Value(_) => joined += 1,
            Resume::Error(e) => return Step::Failed(e),
        }
        match children.get(joined) {
            Some(&child) => Step::join(child),
            None => Step::done(joined as i64),
        }
    }))
}

fn fan_out(out: &Transcript) -> BoxUnit {
    let out = out.clone();
    let mut children: Vec<TaskId> = Vec::new();
    let mut results: Vec<String> = Vec::new();
    Box::new(from_fn("fan_out", move |cx, resume| {
        match resume {
            Resume::Start => {
                for (name, delay) in [("slow", 0.03), ("fast", 0.01)] {
                    let out = out.clone();
                    children.push(cx.spawn(from_fn(name, move |_cx, resume| match resume {
                        Resume::Start => sleep(delay).with_result(name).into(),
                        Resume::Value(v) => {
                            say(&out, format!("{} woke", v));
                            Step::Done(v)
                        }
                        Resume::Error(e) => Step::Failed(e),
                    })));
                }
            }
            Resume::Value(v) => results.push(v.to_string()),
            Resume::Error(e) => return Step::Failed(e),
        }
        match children.get(results.len()) {
            Some(&child) => Step::join(child),
            None => Step::done(results.join(",")),
        }
    }))
}

fn spin(out: &Transcript) -> BoxUnit {
    let out = out.clone();
    Box::new(from_fn("spin", move |cx, _resume| {
        say(&out, "spinning");
        while !cx.abort_requested() {
            std::hint::spin_loop();
        }
        Step::done(())
    }))
}
