//! Terminal and JSON rendering.

use serde::Serialize;
use warden_core::{CheckResult, CheckStatus, FixAttempt, FixOutcome, Report, WardenError};

pub fn print_json<T: Serialize>(value: &T) -> Result<(), WardenError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| WardenError::Json {
        context: "rendering output".to_string(),
        source,
    })?;
    println!("{}", json);
    Ok(())
}

fn marker(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Ok => "✓",
        CheckStatus::Warning => "⚠",
        CheckStatus::Error => "✗",
    }
}

pub fn render_check(result: &CheckResult) -> String {
    let mut out = format!("{} {}: {}", marker(result.status), result.name, result.message);
    for detail in &result.details {
        out.push_str("\n    ");
        out.push_str(detail);
    }
    if let Some(hint) = &result.fix_hint {
        out.push_str("\n    → ");
        out.push_str(hint);
    }
    out
}

pub fn render_report(report: &Report) -> String {
    let mut lines: Vec<String> = report.checks.iter().map(render_check).collect();
    let summary = report.summary;
    lines.push(String::new());
    lines.push(format!(
        "{} checks, {} passed, {} warnings, {} errors",
        summary.total, summary.ok, summary.warning, summary.error
    ));
    lines.join("\n")
}

pub fn render_attempts(attempts: &[FixAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| match &attempt.outcome {
            FixOutcome::Applied => format!("fixed {}", attempt.check),
            FixOutcome::Failed(err) => format!("fix failed for {}: {}", attempt.check, err),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rendering_includes_details_and_hint() {
        let mut result = CheckResult::warning("1 stale lock(s) found")
            .with_details(vec!["Stale locks (dead PIDs):".to_string()])
            .with_fix_hint("Run 'warden doctor --fix' to remove stale locks");
        result.name = "identity-collision".to_string();

        assert_eq!(
            render_check(&result),
            "⚠ identity-collision: 1 stale lock(s) found\n    Stale locks (dead PIDs):\n    → Run 'warden doctor --fix' to remove stale locks"
        );
    }

    #[test]
    fn report_ends_with_summary() {
        let mut ok = CheckResult::ok("fine");
        ok.name = "crew-state".to_string();
        let report = Report::from_results(vec![ok]);
        assert!(render_report(&report).ends_with("1 checks, 1 passed, 0 warnings, 0 errors"));
    }

    #[test]
    fn failed_fix_is_spelled_out() {
        let attempts = vec![FixAttempt {
            check: "orphan-sessions".to_string(),
            outcome: FixOutcome::Failed("tmux gone".to_string()),
        }];
        assert_eq!(
            render_attempts(&attempts),
            "fix failed for orphan-sessions: tmux gone"
        );
    }
}
