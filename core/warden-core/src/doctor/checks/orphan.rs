use tracing::{debug, info};

use crate::classify::{SessionClassifier, TerminationTarget};
use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::error::{Result, WardenError};
use crate::town;

/// Live fleet sessions that match no registered rig or singleton role.
///
/// Crew sessions are listed but never cached for termination.
#[derive(Debug, Default)]
pub struct OrphanSessionCheck {
    orphans: Vec<String>,
}

impl OrphanSessionCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn classifier(ctx: &CheckContext<'_>) -> Result<SessionClassifier> {
        let rigs = town::discover_rigs(ctx.layout)?;
        Ok(SessionClassifier::new(rigs, &ctx.config.sessions))
    }
}

impl Check for OrphanSessionCheck {
    fn name(&self) -> &'static str {
        "orphan-sessions"
    }

    fn description(&self) -> &'static str {
        "Detect orphaned fleet sessions"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Cleanup
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        self.orphans.clear();

        let classifier = match Self::classifier(ctx) {
            Ok(classifier) => classifier,
            Err(err) => {
                return CheckResult::warning(format!("could not determine valid rigs: {}", err))
                    .not_fixable()
            }
        };
        let sessions = match ctx.sessions.list_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                return CheckResult::warning(format!("could not list sessions: {}", err))
                    .not_fixable()
            }
        };

        let classified = classifier.classify_all(sessions.iter().map(String::as_str));
        let orphans: Vec<_> = classified.iter().filter(|s| s.is_orphan()).collect();
        if orphans.is_empty() {
            return CheckResult::ok(format!(
                "All {} fleet sessions are valid",
                classified.len()
            ));
        }

        let mut details = Vec::with_capacity(orphans.len());
        for orphan in &orphans {
            if orphan.protected {
                details.push(format!("Orphan: {} (protected crew session)", orphan.name));
                continue;
            }
            details.push(format!("Orphan: {}", orphan.name));
            if ctx.is_current_session(&orphan.name) {
                debug!(session = %orphan.name, "Not caching current session");
                continue;
            }
            self.orphans.push(orphan.name.clone());
        }

        let result = CheckResult::warning(format!(
            "Found {} orphaned session(s)",
            orphans.len()
        ))
        .with_details(details);

        if self.orphans.is_empty() {
            result
                .with_fix_hint("Only protected sessions are orphaned; stop them by hand if they are done")
                .not_fixable()
        } else {
            result.with_fix_hint("Run 'warden doctor --fix' to kill orphaned sessions")
        }
    }

    fn fix(&mut self, ctx: &CheckContext<'_>) -> Result<()> {
        if self.orphans.is_empty() {
            return Ok(());
        }
        let orphans = std::mem::take(&mut self.orphans);
        let classifier = Self::classifier(ctx)?;

        let mut failures = Vec::new();
        for name in &orphans {
            if ctx.is_current_session(name) {
                continue;
            }
            let Some(target) = TerminationTarget::new(name) else {
                debug!(session = %name, "Skipping crew session");
                continue;
            };
            match ctx.sessions.has_session(name) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    failures.push(format!("{}: {}", name, err));
                    continue;
                }
            }
            if !classifier.classify(name).is_orphan() {
                debug!(session = %name, "Session became valid, skipping");
                continue;
            }
            match ctx.sessions.terminate(&target) {
                Ok(()) => info!(session = %name, "Terminated orphaned session"),
                Err(err) => failures.push(format!("{}: {}", name, err)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WardenError::FixIncomplete {
                check: "orphan session cleanup".to_string(),
                details: failures.join("; "),
            })
        }
    }
}
