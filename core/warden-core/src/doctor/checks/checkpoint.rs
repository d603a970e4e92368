use crate::checkpoint;
use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::error::WardenError;
use crate::keepalive::format_age;
use crate::town;

/// Reports corrupt, unreadable and stale checkpoints. Informational: a stale
/// checkpoint may still be what a successor needs, so nothing is removed.
///
/// Only a checkpoint that fails to parse is an Error. A read failure says
/// nothing about the content and is a Warning.
#[derive(Debug, Default)]
pub struct CheckpointCheck;

impl CheckpointCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Check for CheckpointCheck {
    fn name(&self) -> &'static str {
        "checkpoints"
    }

    fn description(&self) -> &'static str {
        "Inspect crash-recovery checkpoints"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Recovery
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        let workers = match town::worker_dirs(ctx.layout) {
            Ok(workers) => workers,
            Err(err) => {
                return CheckResult::warning(format!("could not list workers: {}", err))
                    .not_fixable()
            }
        };

        let threshold = ctx.config.checkpoints.stale_after();
        let mut found = 0;
        let mut corrupt = Vec::new();
        let mut unreadable = Vec::new();
        let mut stale = Vec::new();
        for worker in &workers {
            let label = worker.assignee();
            match checkpoint::read(&worker.path) {
                Ok(None) => {}
                Ok(Some(cp)) => {
                    found += 1;
                    if cp.is_stale(threshold) {
                        let age = cp
                            .age()
                            .map(format_age)
                            .unwrap_or_else(|| "unknown age".to_string());
                        stale.push(format!("{}: {} old ({})", label, age, cp.summary()));
                    }
                }
                Err(err @ WardenError::CheckpointCorrupt { .. }) => {
                    found += 1;
                    corrupt.push(format!("{}: {}", label, err));
                }
                Err(err) => {
                    found += 1;
                    unreadable.push(format!("{}: {}", label, err));
                }
            }
        }

        if corrupt.is_empty() && unreadable.is_empty() && stale.is_empty() {
            return CheckResult::ok(match found {
                0 => "No checkpoints found".to_string(),
                n => format!("{} checkpoint(s), all recent", n),
            });
        }

        let mut parts = Vec::new();
        let mut details = Vec::new();
        if !corrupt.is_empty() {
            parts.push(format!("{} corrupt checkpoint(s)", corrupt.len()));
            details.push("Corrupt checkpoints:".to_string());
            details.extend(corrupt.iter().map(|line| format!("  {}", line)));
        }
        if !unreadable.is_empty() {
            parts.push(format!("{} unreadable checkpoint(s)", unreadable.len()));
            details.push("Unreadable checkpoints:".to_string());
            details.extend(unreadable.iter().map(|line| format!("  {}", line)));
        }
        if !stale.is_empty() {
            parts.push(format!("{} stale checkpoint(s)", stale.len()));
            details.push(format!(
                "Stale checkpoints (older than {}):",
                format_age(threshold)
            ));
            details.extend(stale.iter().map(|line| format!("  {}", line)));
        }

        let result = if !corrupt.is_empty() {
            CheckResult::error(parts.join(", "))
                .with_fix_hint("Inspect corrupt checkpoints and clear them with 'warden checkpoint clear --dir <worker>'")
        } else if stale.is_empty() {
            CheckResult::warning(parts.join(", "))
                .with_fix_hint("Check permissions on the checkpoint files and run the doctor again")
        } else {
            CheckResult::warning(parts.join(", "))
                .with_fix_hint("Resume or clear stale checkpoints with 'warden checkpoint show|clear --dir <worker>'")
        };
        result.with_details(details).not_fixable()
    }
}
