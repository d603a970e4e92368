//! `warden doctor [--fix] [--json]`.
//!
//! Exits non-zero when the final report still carries an Error.

use warden_core::{Doctor, WardenError};

use crate::output;
use crate::Runtime;

pub fn run(runtime: &Runtime, fix: bool, json: bool) -> Result<bool, WardenError> {
    let ctx = runtime.check_context();
    let mut doctor = Doctor::with_default_checks();

    let report = if fix {
        let run = doctor.fix(&ctx);
        if json {
            output::print_json(&run)?;
        } else {
            if !run.attempts.is_empty() {
                println!("{}\n", output::render_attempts(&run.attempts));
            }
            println!("{}", output::render_report(&run.report));
        }
        run.report
    } else {
        let report = doctor.run(&ctx);
        if json {
            output::print_json(&report)?;
        } else {
            println!("{}", output::render_report(&report));
        }
        report
    };

    tracing::info!(
        ok = report.summary.ok,
        warning = report.summary.warning,
        error = report.summary.error,
        fix,
        "Doctor finished"
    );
    Ok(!report.has_errors())
}
