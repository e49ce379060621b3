// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Kestrel CLI - runs built-in probes against the runtime.

mod help;
mod output;
mod probes;

use std::env;
use std::process;

use colored::Colorize;
use kestrel_rt::{RunError, Runner};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use probes::{Observed, Probe, Transcript};

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_HANG: i32 = 124;

fn main() {
    output::init();
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        help::print_usage();
        return;
    }

    let runner = Runner::from_env();
    debug!(config = ?runner.config(), "runner configured");

    let code = match args[1].as_str() {
        "list" => cmd_list(&runner),
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: kestrel run <probe>");
                process::exit(EXIT_USAGE);
            }
            cmd_run(&runner, &args[2])
        }
        "check" => cmd_check(&runner, &args[2..]),
        "help" | "--help" | "-h" => {
            help::print_usage();
            EXIT_OK
        }
        "version" | "--version" | "-V" => {
            println!("kestrel {}", env!("CARGO_PKG_VERSION"));
            EXIT_OK
        }
        other => {
            eprintln!("{}: unknown command: {}", output::error_label(), other);
            help::print_usage();
            EXIT_USAGE
        }
    };
    process::exit(code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("KESTREL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn lookup(name: &str) -> Result<&'static Probe, i32> {
    probes::find(name).ok_or_else(|| {
        eprintln!("{}: unknown probe: {}", output::error_label(), name);
        eprintln!(
            "{}: {} lists the available probes",
            output::hint_label(),
            output::command("kestrel list")
        );
        EXIT_USAGE
    })
}

fn observe(runner: &Runner, probe: &Probe) -> (Observed, Result<kestrel_rt::Value, RunError>) {
    let out = Transcript::default();
    let result = runner.run(probe.build(&out));
    let lines = out.lock().unwrap().clone();
    (Observed::new(lines, &result), result)
}

fn exit_code(result: &Result<kestrel_rt::Value, RunError>) -> i32 {
    match result {
        Ok(_) => EXIT_OK,
        Err(e) if e.is_hang() => EXIT_HANG,
        Err(e) if e.is_misuse() => EXIT_USAGE,
        Err(_) => EXIT_FAILED,
    }
}

fn cmd_list(runner: &Runner) -> i32 {
    let armed = runner.config().hang_timeout.is_some();
    for probe in probes::all() {
        let note = if probe.needs_watchdog && !armed {
            " (needs KESTREL_HANG_TIMEOUT)"
        } else {
            ""
        };
        println!(
            "  {:<16} {}{}",
            output::probe_name(probe.name),
            probe.about,
            output::dimmed(note)
        );
    }
    EXIT_OK
}

/// Runs one probe and prints what it produced, the way a script would.
fn cmd_run(runner: &Runner, name: &str) -> i32 {
    let probe = match lookup(name) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if probe.needs_watchdog && runner.config().hang_timeout.is_none() {
        eprintln!(
            "{}: probe '{}' never returns without the watchdog",
            output::error_label(),
            probe.name
        );
        eprintln!("{}: set KESTREL_HANG_TIMEOUT=<seconds>", output::hint_label());
        return EXIT_USAGE;
    }

    let (observed, result) = observe(runner, probe);
    for line in &observed.lines {
        println!("{}", line);
    }
    match &result {
        Ok(value) => println!("{}", value),
        Err(e) => eprintln!("{}: {}", output::error_label(), e),
    }
    exit_code(&result)
}

/// Runs each probe twice and compares both runs with the expected
/// transcript and with each other.
fn cmd_check(runner: &Runner, names: &[String]) -> i32 {
    let selected: Vec<&Probe> = if names.is_empty() {
        probes::all().iter().collect()
    } else {
        let mut selected = Vec::new();
        for name in names {
            match lookup(name) {
                Ok(p) => selected.push(p),
                Err(code) => return code,
            }
        }
        selected
    };

    let armed = runner.config().hang_timeout.is_some();
    let (mut passed, mut failed, mut skipped) = (0, 0, 0);

    for probe in selected {
        if probe.needs_watchdog && !armed {
            println!("{} {} {}", output::status_skip(), probe.name, output::dimmed("(watchdog off)"));
            skipped += 1;
            continue;
        }

        let expected = probe.expected();
        let (first, _) = observe(runner, probe);
        let (second, _) = observe(runner, probe);

        if first == expected && second == first {
            println!("{} {}", output::status_pass(), probe.name);
            passed += 1;
            continue;
        }

        println!("{} {}", output::status_fail(), probe.name);
        if first != expected {
            print_diff("expected", &expected, "got", &first);
        } else {
            print_diff("first run", &first, "second run", &second);
        }
        failed += 1;
    }

    println!();
    if failed == 0 {
        println!("{}", output::banner_ok("Check"));
    } else {
        println!("{}", output::banner_fail("Check", failed));
    }
    let mut summary = format!("{}, {}", output::passed_count(passed), output::failed_count(failed));
    if skipped > 0 {
        summary.push_str(&format!(", {}", format!("{} skipped", skipped).dimmed()));
    }
    println!("{}", summary);

    if failed == 0 {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}

fn print_diff(left_label: &str, left: &Observed, right_label: &str, right: &Observed) {
    println!("    {}:", left_label);
    for line in left.to_string().lines() {
        println!("      {}", line);
    }
    println!("    {}:", right_label);
    for line in right.to_string().lines() {
        println!("      {}", line.red());
    }
}
