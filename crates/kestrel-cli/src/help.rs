// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Help text for CLI commands.

use crate::output;

pub fn print_usage() {
    println!(
        "{} {} - cooperative event loop probe harness",
        output::title("Kestrel"),
        output::version(env!("CARGO_PKG_VERSION"))
    );
    println!();
    println!(
        "{}: {} {} {}",
        output::section_header("Usage"),
        output::command("kestrel"),
        output::arg("<command>"),
        output::arg("[args]")
    );
    println!();
    println!("{}", output::section_header("Commands:"));
    println!("  {}                List built-in probes", output::command("list"));
    println!("  {} {}       Run one probe and print its output", output::command("run"), output::arg("<probe>"));
    println!("  {} {} Check probes against expected transcripts", output::command("check"), output::arg("[probe...]"));
    println!("  {}                Show this help", output::command("help"));
    println!("  {}             Show version", output::command("version"));

    println!();
    println!("{}", output::section_header("Environment:"));
    println!("  {}  Abort runs that stop yielding (seconds)", output::arg("KESTREL_HANG_TIMEOUT"));
    println!("  {}    Warn every N suspensions of one task (0 disables)", output::arg("KESTREL_HANG_PROBE"));
    println!("  {}         monotonic (default) or virtual", output::arg("KESTREL_CLOCK"));
    println!("  {}           Log filter, e.g. debug or kestrel_rt=trace", output::arg("KESTREL_LOG"));
    println!("  {}  Disable or force colored output", output::arg("NO_COLOR / FORCE_COLOR"));

    println!();
    println!("{}", output::section_header("Exit codes:"));
    println!("  0 ok, 1 failure or mismatch, 2 usage or misuse, 124 watchdog abort");
}
