use std::collections::{HashMap, HashSet};

use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::process::{has_ancestor, ProcessEntry};

/// Agent runtime processes that are not running under any tmux pane.
///
/// Report only. Such a process may be a user's own interactive session, so
/// nothing here is ever stopped.
#[derive(Debug, Default)]
pub struct OrphanProcessCheck;

impl OrphanProcessCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Check for OrphanProcessCheck {
    fn name(&self) -> &'static str {
        "orphan-processes"
    }

    fn description(&self) -> &'static str {
        "Detect runtime processes outside tmux"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Cleanup
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        let table = match ctx.processes.processes() {
            Ok(table) => table,
            Err(err) => {
                return CheckResult::warning(format!("could not list processes: {}", err))
                    .not_fixable()
            }
        };
        let runtimes: Vec<&ProcessEntry> = table
            .iter()
            .filter(|entry| ctx.config.processes.is_runtime(&entry.name))
            .collect();
        if runtimes.is_empty() {
            return CheckResult::ok("No runtime processes running");
        }

        let sessions = match ctx.sessions.list_sessions() {
            Ok(sessions) => sessions,
            Err(err) => {
                return CheckResult::warning(format!("could not list sessions: {}", err))
                    .not_fixable()
            }
        };
        let mut panes = HashSet::new();
        for name in &sessions {
            match ctx.sessions.pane_pids(name) {
                Ok(pids) => panes.extend(pids),
                Err(err) => {
                    return CheckResult::warning(format!(
                        "could not list panes of {}: {}",
                        name, err
                    ))
                    .not_fixable()
                }
            }
        }

        let parents: HashMap<u32, u32> = table
            .iter()
            .filter_map(|entry| Some((entry.pid, entry.parent?)))
            .collect();
        let outside: Vec<&&ProcessEntry> = runtimes
            .iter()
            .filter(|entry| !has_ancestor(entry.pid, &parents, &panes))
            .collect();

        if outside.is_empty() {
            return CheckResult::ok(format!(
                "All {} runtime process(es) run inside tmux",
                runtimes.len()
            ));
        }

        let mut details = vec![
            "These may be interactive sessions started by hand.".to_string(),
            "They are reported only and never stopped by the doctor.".to_string(),
        ];
        details.extend(
            outside
                .iter()
                .map(|entry| format!("PID {}: {}", entry.pid, entry.name)),
        );
        CheckResult::warning(format!(
            "Found {} runtime process(es) outside tmux",
            outside.len()
        ))
        .with_details(details)
        .not_fixable()
    }
}
