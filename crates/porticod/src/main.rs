//! Binary entrypoint for the Portico gateway daemon.
//!
//! Delegates to [`porticod::run`]; errors that occur before telemetry is
//! installed are written to stderr directly.

use std::io::Write;
use std::process::ExitCode;

fn main() -> ExitCode {
    match porticod::run(std::env::args_os()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = std::io::stderr().lock();
            drop(writeln!(stderr, "porticod: {error}"));
            ExitCode::FAILURE
        }
    }
}
