use serde::Serialize;
use tracing::{debug, info, warn};

use super::checks::{
    CheckpointCheck, CrewStateCheck, IdentityCollisionCheck, OrphanProcessCheck,
    OrphanSessionCheck, ZombieSessionCheck,
};
use super::{Check, CheckContext, CheckResult, CheckStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub ok: usize,
    pub warning: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub checks: Vec<CheckResult>,
}

impl Report {
    pub fn from_results(checks: Vec<CheckResult>) -> Self {
        let mut summary = Summary {
            total: checks.len(),
            ..Summary::default()
        };
        for result in &checks {
            match result.status {
                CheckStatus::Ok => summary.ok += 1,
                CheckStatus::Warning => summary.warning += 1,
                CheckStatus::Error => summary.error += 1,
            }
        }
        Self { summary, checks }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.error > 0
    }

    pub fn worst_status(&self) -> CheckStatus {
        self.checks
            .iter()
            .map(|result| result.status)
            .max()
            .unwrap_or(CheckStatus::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum FixOutcome {
    Applied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixAttempt {
    pub check: String,
    pub outcome: FixOutcome,
}

/// Result of [`Doctor::fix`]: the post-fix report plus what was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixRun {
    pub report: Report,
    pub attempts: Vec<FixAttempt>,
}

/// Ordered registry of checks.
pub struct Doctor {
    checks: Vec<Box<dyn Check>>,
}

impl Default for Doctor {
    fn default() -> Self {
        Self::new()
    }
}

impl Doctor {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Registry with the standard checks in their standard order.
    pub fn with_default_checks() -> Self {
        let mut doctor = Self::new();
        doctor.register(Box::new(IdentityCollisionCheck::new()));
        doctor.register(Box::new(OrphanSessionCheck::new()));
        doctor.register(Box::new(ZombieSessionCheck::new()));
        doctor.register(Box::new(OrphanProcessCheck::new()));
        doctor.register(Box::new(CrewStateCheck::new()));
        doctor.register(Box::new(CheckpointCheck::new()));
        doctor
    }

    pub fn register(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn register_all(&mut self, checks: Vec<Box<dyn Check>>) {
        self.checks.extend(checks);
    }

    /// `(name, description)` of every registered check, in order.
    pub fn checks(&self) -> Vec<(&'static str, &'static str)> {
        self.checks
            .iter()
            .map(|check| (check.name(), check.description()))
            .collect()
    }

    pub fn run(&mut self, ctx: &CheckContext<'_>) -> Report {
        let results = self
            .checks
            .iter_mut()
            .map(|check| run_one(check.as_mut(), ctx))
            .collect();
        Report::from_results(results)
    }

    /// Runs every check, fixes each non-OK fixable one from the state its run
    /// just cached, then runs everything again for the final report.
    pub fn fix(&mut self, ctx: &CheckContext<'_>) -> FixRun {
        let mut attempts = Vec::new();
        for check in self.checks.iter_mut() {
            let result = run_one(check.as_mut(), ctx);
            if result.is_ok() || !result.fixable {
                continue;
            }

            let outcome = match check.fix(ctx) {
                Ok(()) => {
                    info!(check = check.name(), "Fix applied");
                    FixOutcome::Applied
                }
                Err(err) => {
                    warn!(check = check.name(), error = %err, "Fix failed");
                    FixOutcome::Failed(err.to_string())
                }
            };
            attempts.push(FixAttempt {
                check: check.name().to_string(),
                outcome,
            });
        }

        FixRun {
            report: self.run(ctx),
            attempts,
        }
    }
}

fn run_one(check: &mut dyn Check, ctx: &CheckContext<'_>) -> CheckResult {
    let mut result = check.run(ctx);
    result.name = check.name().to_string();
    result.category = check.category();
    result.fixable = result.fixable && check.can_fix() && !result.is_ok();
    debug!(check = check.name(), status = ?result.status, "Check finished");
    result
}
