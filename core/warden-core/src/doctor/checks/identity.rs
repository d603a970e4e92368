use tracing::info;

use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::error::Result;
use crate::identity::{IdentityReconciler, LockFinding};
use crate::keepalive::{format_age, Keepalive};
use crate::lock;

/// Stale, orphaned, corrupt and unreadable workspace locks.
///
/// Corrupt lock files make the result an Error; unreadable ones only a
/// Warning, since nothing is known about what they hold.
///
/// Fix removes stale locks only (PID dead and no live session), each one
/// re-read and re-classified against a fresh session listing first.
#[derive(Debug, Default)]
pub struct IdentityCollisionCheck {
    stale: Vec<LockFinding>,
}

impl IdentityCollisionCheck {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Check for IdentityCollisionCheck {
    fn name(&self) -> &'static str {
        "identity-collision"
    }

    fn description(&self) -> &'static str {
        "Check for agent identity collisions and stale locks"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Infrastructure
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        self.stale.clear();

        let scan = match lock::find_all(ctx.layout.root()) {
            Ok(scan) => scan,
            Err(err) => {
                return CheckResult::warning(format!("could not scan for locks: {}", err))
                    .not_fixable()
            }
        };
        if scan.is_empty() {
            return CheckResult::ok("no worker locks found");
        }

        let mut messages = Vec::new();
        let mut details = Vec::new();

        if !scan.corrupt.is_empty() {
            messages.push(format!("{} corrupt lock file(s)", scan.corrupt.len()));
            details.push("Corrupt lock files:".to_string());
            for corrupt in &scan.corrupt {
                details.push(format!("  {}: {}", corrupt.path.display(), corrupt.error));
            }
        }
        if !scan.unreadable.is_empty() {
            messages.push(format!("{} unreadable lock file(s)", scan.unreadable.len()));
            details.push("Unreadable lock files:".to_string());
            for unreadable in &scan.unreadable {
                details.push(format!("  {}: {}", unreadable.path.display(), unreadable.error));
            }
        }

        let reconciler = IdentityReconciler::new(ctx.processes, ctx.sessions);
        let live = match reconciler.snapshot() {
            Ok(live) => live,
            Err(err) => {
                let message = format!("could not list sessions, lock liveness unknown: {}", err);
                messages.push(message);
                let result = if scan.corrupt.is_empty() {
                    CheckResult::warning(messages.join(", "))
                } else {
                    CheckResult::error(messages.join(", "))
                };
                return result.with_details(details).not_fixable();
            }
        };

        let reconciliation = reconciler.classify(&scan.locks, &live);
        if reconciliation.is_clean() && scan.corrupt.is_empty() && scan.unreadable.is_empty() {
            return CheckResult::ok(format!(
                "{} worker lock(s), all healthy",
                reconciliation.healthy.len()
            ));
        }

        if !reconciliation.stale.is_empty() {
            messages.insert(0, format!("{} stale lock(s) found", reconciliation.stale.len()));
            details.push("Stale locks (dead PIDs):".to_string());
            for finding in &reconciliation.stale {
                details.push(format!("  {}", finding.describe()));
            }
        }

        if !reconciliation.orphaned.is_empty() {
            messages.push(format!("{} orphaned lock(s)", reconciliation.orphaned.len()));
            details.push("Orphaned locks (missing sessions):".to_string());
            for finding in &reconciliation.orphaned {
                let mut line = format!("  {}", finding.describe());
                if let Some(state) = Keepalive.read(&finding.lock.workspace_dir) {
                    line.push_str(&format!(
                        ", last activity {} ago: {}",
                        format_age(state.age()),
                        state.last_command
                    ));
                }
                details.push(line);
            }
        }

        let result = if scan.corrupt.is_empty() {
            CheckResult::warning(messages.join(", "))
        } else {
            CheckResult::error(messages.join(", "))
        }
        .with_details(details);

        let result = if !reconciliation.stale.is_empty() {
            result.with_fix_hint("Run 'warden doctor --fix' to remove stale locks")
        } else if !reconciliation.orphaned.is_empty() {
            result
                .with_fix_hint(
                    "Orphaned locks have a live process and are never removed automatically; inspect the workspace",
                )
                .not_fixable()
        } else if !scan.corrupt.is_empty() {
            result
                .with_fix_hint("Inspect or delete the corrupt lock files by hand")
                .not_fixable()
        } else {
            result
                .with_fix_hint("Check permissions on the unreadable lock files and run the doctor again")
                .not_fixable()
        };

        self.stale = reconciliation.stale;
        result
    }

    fn fix(&mut self, ctx: &CheckContext<'_>) -> Result<()> {
        if self.stale.is_empty() {
            return Ok(());
        }
        let reconciler = IdentityReconciler::new(ctx.processes, ctx.sessions);
        let live = reconciler.snapshot()?;
        let stale = std::mem::take(&mut self.stale);
        let removed = reconciler.remove_stale(&stale, &live)?;
        info!(removed, candidates = stale.len(), "Cleaned stale locks");
        Ok(())
    }
}
