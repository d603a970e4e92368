use tracing::{debug, info};

use crate::classify::{is_crew_session, is_fleet_session, TerminationTarget};
use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::error::{Result, WardenError};

/// Fleet sessions still open after every process in their panes has died.
///
/// Crew sessions are skipped entirely: a crew member's pane may sit at a dead
/// agent while the human reads the scrollback.
#[derive(Debug, Default)]
pub struct ZombieSessionCheck {
    zombies: Vec<String>,
}

impl ZombieSessionCheck {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `Some(dead pids)` when the session has panes and none of them is alive.
fn dead_panes(ctx: &CheckContext<'_>, name: &str) -> Result<Option<Vec<u32>>> {
    let pids = ctx.sessions.pane_pids(name)?;
    if pids.is_empty() || pids.iter().any(|&pid| ctx.processes.is_alive(pid)) {
        return Ok(None);
    }
    Ok(Some(pids))
}

impl Check for ZombieSessionCheck {
    fn name(&self) -> &'static str {
        "zombie-sessions"
    }

    fn description(&self) -> &'static str {
        "Detect fleet sessions whose agent process is dead"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Cleanup
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        self.zombies.clear();

        let sessions = match ctx.sessions.list_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                return CheckResult::warning(format!("could not list sessions: {}", err))
                    .not_fixable()
            }
        };

        let mut checked = 0;
        let mut details = Vec::new();
        let mut zombies = 0;
        let mut uninspected = 0;
        for name in sessions.iter().filter(|name| is_fleet_session(name)) {
            if is_crew_session(name) {
                continue;
            }
            checked += 1;
            match dead_panes(ctx, name) {
                Ok(None) => {}
                Ok(Some(pids)) => {
                    zombies += 1;
                    let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
                    details.push(format!("Zombie: {} (dead pane PID {})", name, pids.join(", ")));
                    if ctx.is_current_session(name) {
                        debug!(session = %name, "Not caching current session");
                        continue;
                    }
                    self.zombies.push(name.clone());
                }
                Err(err) => {
                    uninspected += 1;
                    details.push(format!("Could not inspect {}: {}", name, err));
                }
            }
        }

        if zombies == 0 && uninspected == 0 {
            return CheckResult::ok(format!("All {} fleet session(s) have a live process", checked));
        }

        let mut parts = Vec::new();
        if zombies > 0 {
            parts.push(format!("Found {} zombie session(s)", zombies));
        }
        if uninspected > 0 {
            parts.push(format!("could not inspect {} session(s)", uninspected));
        }
        let result = CheckResult::warning(parts.join(", ")).with_details(details);

        if self.zombies.is_empty() {
            result.not_fixable()
        } else {
            result.with_fix_hint("Run 'warden doctor --fix' to kill zombie sessions")
        }
    }

    fn fix(&mut self, ctx: &CheckContext<'_>) -> Result<()> {
        if self.zombies.is_empty() {
            return Ok(());
        }
        let zombies = std::mem::take(&mut self.zombies);

        let mut failures = Vec::new();
        for name in &zombies {
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
            match dead_panes(ctx, name) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(session = %name, "Session has a live process again, skipping");
                    continue;
                }
                Err(err) => {
                    failures.push(format!("{}: {}", name, err));
                    continue;
                }
            }
            match ctx.sessions.terminate(&target) {
                Ok(()) => info!(session = %name, "Terminated zombie session"),
                Err(err) => failures.push(format!("{}: {}", name, err)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WardenError::FixIncomplete {
                check: "zombie session cleanup".to_string(),
                details: failures.join("; "),
            })
        }
    }
}
