use std::io;

use chrono::Utc;
use tracing::info;

use crate::doctor::{Check, CheckCategory, CheckContext, CheckResult};
use crate::error::{Result, WardenError};
use crate::storage;
use crate::town::{self, CrewState, WorkerDir, WorkerRole};

enum StateFile {
    Missing,
    Complete,
    Incomplete(Vec<&'static str>),
    Broken(String),
}

fn inspect(worker: &WorkerDir) -> StateFile {
    let path = town::crew_state_path(&worker.path);
    let content = match fs_err::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return StateFile::Missing,
        Err(err) => return StateFile::Broken(format!("cannot read state.json: {}", err)),
    };
    match serde_json::from_str::<CrewState>(&content) {
        Ok(state) => {
            let missing = state.missing_fields();
            if missing.is_empty() {
                StateFile::Complete
            } else {
                StateFile::Incomplete(missing)
            }
        }
        Err(_) => StateFile::Broken("invalid JSON in state.json".to_string()),
    }
}

/// Required fields of each crew worker's `state.json`.
#[derive(Debug, Default)]
pub struct CrewStateCheck {
    incomplete: Vec<WorkerDir>,
}

impl CrewStateCheck {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Check for CrewStateCheck {
    fn name(&self) -> &'static str {
        "crew-state"
    }

    fn description(&self) -> &'static str {
        "Validate crew worker state.json files"
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Cleanup
    }

    fn can_fix(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult {
        self.incomplete.clear();

        let crew: Vec<_> = match town::worker_dirs(ctx.layout) {
            Ok(workers) => workers
                .into_iter()
                .filter(|w| w.role == WorkerRole::Crew)
                .collect(),
            Err(err) => {
                return CheckResult::warning(format!("could not list crew workspaces: {}", err))
                    .not_fixable()
            }
        };
        if crew.is_empty() {
            return CheckResult::ok("No crew workspaces found");
        }

        let mut broken = Vec::new();
        let mut details = Vec::new();
        let mut checked = 0;
        for worker in crew {
            let label = format!("{}/{}", worker.rig, worker.name);
            match inspect(&worker) {
                StateFile::Missing => {}
                StateFile::Complete => checked += 1,
                StateFile::Incomplete(missing) => {
                    checked += 1;
                    let issues: Vec<_> = missing.iter().map(|f| format!("missing {}", f)).collect();
                    details.push(format!("{}: {}", label, issues.join(", ")));
                    self.incomplete.push(worker);
                }
                StateFile::Broken(issue) => {
                    checked += 1;
                    details.push(format!("{}: {}", label, issue));
                    broken.push(label);
                }
            }
        }

        if details.is_empty() {
            return CheckResult::ok(format!("All {} crew state files valid", checked));
        }

        let mut parts = Vec::new();
        if !self.incomplete.is_empty() {
            parts.push(format!("{} incomplete", self.incomplete.len()));
        }
        if !broken.is_empty() {
            parts.push(format!("{} unreadable", broken.len()));
        }
        let message = format!("Crew state problems: {}", parts.join(", "));

        let result = if broken.is_empty() {
            CheckResult::warning(message)
        } else {
            CheckResult::error(message)
        }
        .with_details(details);

        if self.incomplete.is_empty() {
            result
                .with_fix_hint("Repair or delete the unreadable state.json files by hand")
                .not_fixable()
        } else {
            result.with_fix_hint("Run 'warden doctor --fix' to fill in missing fields")
        }
    }

    fn fix(&mut self, _ctx: &CheckContext<'_>) -> Result<()> {
        let now = Utc::now();
        let mut failures = Vec::new();
        for worker in std::mem::take(&mut self.incomplete) {
            if let Err(err) = repair(&worker, now) {
                failures.push(format!("{}/{}: {}", worker.rig, worker.name, err));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(WardenError::FixIncomplete {
                check: "crew state repair".to_string(),
                details: failures.join("; "),
            })
        }
    }
}

/// Re-reads the file so a concurrent edit is not clobbered with stale data.
fn repair(worker: &WorkerDir, now: chrono::DateTime<Utc>) -> Result<()> {
    let path = town::crew_state_path(&worker.path);
    let content = fs_err::read_to_string(&path)
        .map_err(|err| WardenError::io("reading crew state", err))?;
    let mut state: CrewState = serde_json::from_str(&content)
        .map_err(|err| WardenError::json("parsing crew state", err))?;
    if state.missing_fields().is_empty() {
        return Ok(());
    }
    state.fill_missing(worker, now);
    let json = serde_json::to_vec_pretty(&state)
        .map_err(|err| WardenError::json("serializing crew state", err))?;
    storage::atomic_write(&path, &json)?;
    info!(path = %path.display(), "Repaired crew state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{FakeProcessProbe, FakeSessionManager};
    use crate::config::DoctorConfig;
    use crate::doctor::CheckStatus;
    use crate::storage::TownLayout;
    use tempfile::tempdir;

    fn write_state(layout: &TownLayout, rig: &str, name: &str, json: &str) -> std::path::PathBuf {
        let dir = layout.crew_dir(rig).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = town::crew_state_path(&dir);
        std::fs::write(&path, json).unwrap();
        path
    }

    fn run_with<T>(layout: &TownLayout, f: impl FnOnce(&CheckContext<'_>) -> T) -> T {
        let config = DoctorConfig::default();
        let sessions = FakeSessionManager::new();
        let processes = FakeProcessProbe::new();
        f(&CheckContext {
            layout,
            config: &config,
            sessions: &sessions,
            processes: &processes,
            current_session: None,
        })
    }

    #[test]
    fn no_crew_is_ok() {
        let temp = tempdir().unwrap();
        let layout = TownLayout::new(temp.path());
        let result = run_with(&layout, |ctx| CrewStateCheck::new().run(ctx));
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.message, "No crew workspaces found");
    }

    #[test]
    fn complete_and_missing_files_are_ok() {
        let temp = tempdir().unwrap();
        let layout = TownLayout::new(temp.path());
        write_state(
            &layout,
            "acme",
            "joe",
            r#"{"name":"joe","rig":"acme","clone_path":"/town/acme/crew/joe"}"#,
        );
        std::fs::create_dir_all(layout.crew_dir("acme").join("max")).unwrap();

        let result = run_with(&layout, |ctx| CrewStateCheck::new().run(ctx));
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.message, "All 1 crew state files valid");
    }

    #[test]
    fn incomplete_state_is_filled_preserving_existing_fields() {
        let temp = tempdir().unwrap();
        let layout = TownLayout::new(temp.path());
        let path = write_state(
            &layout,
            "acme",
            "joe",
            r#"{"name":"joe","branch":"feature","shell":"zsh"}"#,
        );

        let mut check = CrewStateCheck::new();
        let result = run_with(&layout, |ctx| check.run(ctx));
        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.details, vec!["acme/joe: missing rig, missing clone_path".to_string()]);
        assert!(result.fixable);

        run_with(&layout, |ctx| check.fix(ctx)).unwrap();
        let repaired: CrewState =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(repaired.name, "joe");
        assert_eq!(repaired.rig, "acme");
        assert_eq!(repaired.branch, "feature");
        assert!(repaired.clone_path.ends_with("joe"));
        assert_eq!(repaired.extra["shell"], "zsh");

        let result = run_with(&layout, |ctx| check.run(ctx));
        assert_eq!(result.status, CheckStatus::Ok);
    }

    #[test]
    fn corrupt_state_is_an_error_and_left_alone() {
        let temp = tempdir().unwrap();
        let layout = TownLayout::new(temp.path());
        let path = write_state(&layout, "acme", "joe", "{not json");

        let mut check = CrewStateCheck::new();
        let result = run_with(&layout, |ctx| check.run(ctx));
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.details, vec!["acme/joe: invalid JSON in state.json".to_string()]);
        assert!(!result.fixable);

        run_with(&layout, |ctx| check.fix(ctx)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }
}
