// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end behavior of `run`: ordering around sleeps, carried results,
//! loop identity, nesting and error identity.

use std::cell::RefCell;
use std::rc::Rc;

use kestrel_rt::{
    current_loop, from_fn, run, sleep, AppError, LoopHandle, MisuseError, Resume, RunError, Step,
    Unit, Value,
};
use proptest::prelude::*;

type Transcript = Rc<RefCell<Vec<String>>>;

/// `for i in range(n): await sleep(0); acc += i` then `return acc`.
fn index_sum(n: i64) -> impl Unit + 'static {
    let mut i = 0i64;
    let mut acc = 0i64;
    let mut started = false;
    from_fn("index_sum", move |_cx, resume| {
        if let Resume::Error(e) = resume {
            return Step::Failed(e);
        }
        if started {
            acc += i;
            i += 1;
        } else {
            started = true;
        }
        if i < n {
            sleep(0.0).into()
        } else {
            Step::done(acc)
        }
    })
}

/// `print(1); await sleep(0); print(2)`
fn print_around_sleep(out: &Transcript) -> impl Unit + 'static {
    let out = out.clone();
    from_fn("print_order", move |_cx, resume| match resume {
        Resume::Start => {
            out.borrow_mut().push("1".to_string());
            sleep(0.0).into()
        }
        Resume::Value(_) => {
            out.borrow_mut().push("2".to_string());
            Step::done(())
        }
        Resume::Error(e) => Step::Failed(e),
    })
}

proptest! {
    #[test]
    fn zero_sleeps_accumulate_index_sum(n in 0i64..200) {
        let expected = n * (n - 1) / 2;
        prop_assert_eq!(run(index_sum(n)).unwrap(), Value::Int(expected));
    }
}

#[test]
fn index_sum_small_cases() {
    assert_eq!(run(index_sum(0)).unwrap(), Value::Int(0));
    assert_eq!(run(index_sum(1)).unwrap(), Value::Int(0));
    assert_eq!(run(index_sum(10)).unwrap(), Value::Int(45));
}

#[test]
fn output_order_around_zero_sleep() {
    let out: Transcript = Rc::default();
    let value = run(print_around_sleep(&out)).unwrap();
    assert_eq!(value, Value::None);
    assert_eq!(*out.borrow(), vec!["1", "2"]);
}

#[test]
fn sleep_results_are_delivered() {
    // await sleep(0, result=3) + await sleep(0.0, 4)
    let mut parts = Vec::new();
    let value = run(from_fn("sleep_result", move |_cx, resume| {
        match resume {
            Resume::Start => return sleep(0.0).with_result(3).into(),
            Resume::Value(v) => parts.push(v),
            Resume::Error(e) => return Step::Failed(e),
        }
        if parts.len() == 1 {
            return sleep(0.0).with_result(4).into();
        }
        let total: i64 = parts.iter().filter_map(Value::as_int).sum();
        Step::done(total)
    }))
    .unwrap();
    assert_eq!(value, Value::Int(7));
}

#[test]
fn sleep_without_result_resumes_with_none() {
    let value = run(from_fn("none", |_cx, resume| match resume {
        Resume::Start => sleep(-5.0).into(),
        Resume::Value(v) => Step::Done(v),
        Resume::Error(e) => Step::Failed(e),
    }))
    .unwrap();
    assert_eq!(value, Value::None);
}

#[test]
fn current_loop_outside_run_is_misuse() {
    let err = current_loop().unwrap_err();
    assert_eq!(err, MisuseError::NoRunningLoop);
    assert_eq!(RunError::from(err).kind(), "RuntimeError");
}

#[test]
fn current_loop_inside_run_identifies_that_run() {
    let seen: Rc<RefCell<Vec<(LoopHandle, LoopHandle)>>> = Rc::default();
    for _ in 0..2 {
        let seen = seen.clone();
        run(from_fn("who", move |cx, _resume| {
            let current = current_loop().expect("loop is active inside run");
            seen.borrow_mut().push((current, cx.loop_handle()));
            Step::done(())
        }))
        .unwrap();
    }
    let seen = seen.borrow();
    assert!(seen.iter().all(|(current, own)| current == own));
    assert_ne!(seen[0].0, seen[1].0, "each run gets a fresh loop");
    assert!(current_loop().is_err(), "identity cleared after run");
}

#[test]
fn nested_run_is_misuse_not_a_hang() {
    let inner_err: Rc<RefCell<Option<RunError>>> = Rc::default();
    let slot = inner_err.clone();
    let outer = run(from_fn("outer", move |_cx, _resume| {
        match run(from_fn("inner", |_cx, _resume| Step::done(1))) {
            Ok(_) => Step::done("nested run succeeded"),
            Err(RunError::Misuse(m)) => {
                *slot.borrow_mut() = Some(RunError::Misuse(m));
                Step::Failed(m.into())
            }
            Err(other) => Step::Failed(AppError::new("AssertionError", other.to_string())),
        }
    }));

    let inner = inner_err.borrow().clone().expect("inner run must fail");
    assert!(inner.is_misuse());
    assert!(matches!(inner, RunError::Misuse(MisuseError::LoopAlreadyRunning)));

    // The unit re-raised it as a RuntimeError; the outer run reports that verbatim.
    let outer = outer.unwrap_err();
    assert!(!outer.is_misuse());
    assert_eq!(outer.kind(), "RuntimeError");
    assert!(current_loop().is_err());
}

#[test]
fn error_identity_survives_suspensions() {
    let mut step = 0;
    let err = run(from_fn("divide", move |_cx, _resume| {
        step += 1;
        if step <= 3 {
            sleep(0.0).into()
        } else {
            Step::fail("ZeroDivisionError", "division by zero")
        }
    }))
    .unwrap_err();
    assert_eq!(err.as_app(), Some(&AppError::new("ZeroDivisionError", "division by zero")));
    assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
}

#[test]
fn identity_cleared_after_failure_and_panic() {
    let _ = run(from_fn("fails", |_cx, _resume| Step::fail("KeyError", "'x'")));
    assert!(current_loop().is_err());

    let panicked = std::panic::catch_unwind(|| {
        let _ = run(from_fn("panics", |_cx, _resume| -> Step { panic!("boom") }));
    });
    assert!(panicked.is_err());
    assert!(current_loop().is_err());
    // A fresh run still works afterwards.
    assert_eq!(run(index_sum(4)).unwrap(), Value::Int(6));
}

#[test]
fn reruns_are_idempotent() {
    let once = || {
        let out: Transcript = Rc::default();
        let value = run(print_around_sleep(&out)).unwrap();
        let lines = out.borrow().clone();
        (lines, value)
    };
    assert_eq!(once(), once());
}

#[test]
fn fan_out_join_collects_children_in_order() {
    let out: Transcript = Rc::default();
    let log = out.clone();
    let mut children = Vec::new();
    let mut results = Vec::new();
    let value = run(from_fn("parent", move |cx, resume| {
        match resume {
            Resume::Start => {
                for (name, delay) in [("slow", 0.03), ("fast", 0.01)] {
                    let log = log.clone();
                    children.push(cx.spawn(from_fn(name, move |_cx, resume| match resume {
                        Resume::Start => sleep(delay).with_result(name).into(),
                        Resume::Value(v) => {
                            log.borrow_mut().push(format!("{} woke", v));
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
    .unwrap();
    assert_eq!(value, Value::Str("slow,fast".into()));
    assert_eq!(*out.borrow(), vec!["fast woke", "slow woke"]);
}
