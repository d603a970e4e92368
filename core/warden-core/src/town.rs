//! Rig registry, worker enumeration and crew state files.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};
use crate::storage::{TownLayout, MAYOR_DIR};

// ─────────────────────────────────────────────────────────────────────────────
// Rig Registry
// ─────────────────────────────────────────────────────────────────────────────

/// `mayor/rigs.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigsRegistry {
    pub version: u32,
    pub rigs: BTreeMap<String, RigEntry>,
}

impl Default for RigsRegistry {
    fn default() -> Self {
        Self {
            version: 1,
            rigs: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Loads the registry. A missing file is an empty registry.
pub fn load_registry(layout: &TownLayout) -> Result<RigsRegistry> {
    let path = layout.rigs_file();
    let content = match fs_err::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(RigsRegistry::default()),
        Err(err) => return Err(WardenError::io("reading rig registry", err)),
    };
    serde_json::from_str(&content).map_err(|err| WardenError::RigRegistryMalformed {
        path,
        details: err.to_string(),
    })
}

/// Registered rigs plus any top-level directory that has `crew/` or
/// `polecats/`, sorted and deduplicated.
///
/// Requires `<root>/mayor/`; without it this is not a town.
pub fn discover_rigs(layout: &TownLayout) -> Result<Vec<String>> {
    if !layout.mayor_dir().is_dir() {
        return Err(WardenError::TownRootNotFound(layout.root().to_path_buf()));
    }

    let mut rigs: BTreeSet<String> = load_registry(layout)?.rigs.into_keys().collect();
    for name in candidate_rig_dirs(layout)? {
        if layout.crew_dir(&name).is_dir() || layout.polecats_dir(&name).is_dir() {
            rigs.insert(name);
        }
    }
    Ok(rigs.into_iter().collect())
}

/// Top-level directories that could be rigs (not hidden, not `mayor`).
fn candidate_rig_dirs(layout: &TownLayout) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs_err::read_dir(layout.root()).map_err(|e| WardenError::io("listing town root", e))? {
        let entry = entry.map_err(|e| WardenError::io("listing town root", e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || name == MAYOR_DIR || !entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Directories
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Crew,
    Polecat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerDir {
    pub rig: String,
    pub role: WorkerRole,
    pub name: String,
    pub path: PathBuf,
}

impl WorkerDir {
    /// Issue-tracker assignee form: `<rig>/crew/<name>` or `<rig>/polecats/<name>`.
    pub fn assignee(&self) -> String {
        let group = match self.role {
            WorkerRole::Crew => "crew",
            WorkerRole::Polecat => "polecats",
        };
        format!("{}/{}/{}", self.rig, group, self.name)
    }
}

/// Crew and polecat worker directories of every candidate rig, in path order.
/// Hidden entries are skipped.
pub fn worker_dirs(layout: &TownLayout) -> Result<Vec<WorkerDir>> {
    let mut workers = Vec::new();
    for rig in candidate_rig_dirs(layout)? {
        for (role, dir) in [
            (WorkerRole::Crew, layout.crew_dir(&rig)),
            (WorkerRole::Polecat, layout.polecats_dir(&rig)),
        ] {
            let Ok(entries) = fs_err::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if name.starts_with('.') || !entry.path().is_dir() {
                    continue;
                }
                workers.push(WorkerDir {
                    rig: rig.clone(),
                    role,
                    name,
                    path: entry.path(),
                });
            }
        }
    }
    workers.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(workers)
}

/// The worker whose directory is or contains `path`.
pub fn worker_for_path(layout: &TownLayout, path: &Path) -> Option<WorkerDir> {
    let relative = path.strip_prefix(layout.root()).ok()?;
    let mut parts = relative.components().map(|c| c.as_os_str().to_str());
    let rig = parts.next()??;
    let group = parts.next()??;
    let name = parts.next()??;
    let role = match group {
        "crew" => WorkerRole::Crew,
        "polecats" => WorkerRole::Polecat,
        _ => return None,
    };
    Some(WorkerDir {
        rig: rig.to_string(),
        role,
        name: name.to_string(),
        path: layout.root().join(rig).join(group).join(name),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Crew State
// ─────────────────────────────────────────────────────────────────────────────

pub const CREW_STATE_FILE: &str = "state.json";

/// `<rig>/crew/<name>/state.json`. Unknown fields survive a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rig: String,
    #[serde(default)]
    pub clone_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CrewState {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.rig.is_empty() {
            missing.push("rig");
        }
        if self.clone_path.is_empty() {
            missing.push("clone_path");
        }
        missing
    }

    /// Fills empty fields from the worker's location, keeping anything
    /// already set.
    pub fn fill_missing(&mut self, worker: &WorkerDir, now: DateTime<Utc>) {
        if self.name.is_empty() {
            self.name = worker.name.clone();
        }
        if self.rig.is_empty() {
            self.rig = worker.rig.clone();
        }
        if self.clone_path.is_empty() {
            self.clone_path = worker.path.display().to_string();
        }
        if self.branch.is_empty() {
            self.branch = "main".to_string();
        }
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }
}

pub fn crew_state_path(worker_dir: &Path) -> PathBuf {
    worker_dir.join(CREW_STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn town() -> (tempfile::TempDir, TownLayout) {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("mayor")).unwrap();
        let layout = TownLayout::new(temp.path());
        (temp, layout)
    }

    #[test]
    fn discover_rigs_merges_registry_and_directories() {
        let (temp, layout) = town();
        std::fs::write(
            layout.rigs_file(),
            r#"{"version":1,"rigs":{"beads":{"git_url":"https://example.com/beads.git","beads":{"prefix":"be"}}}}"#,
        )
        .unwrap();
        std::fs::create_dir_all(temp.path().join("gastown/crew")).unwrap();
        std::fs::create_dir_all(temp.path().join("gastown/polecats")).unwrap();
        std::fs::create_dir_all(temp.path().join("niflheim/crew")).unwrap();
        std::fs::create_dir_all(temp.path().join("grctool/polecats")).unwrap();
        std::fs::create_dir_all(temp.path().join("not-a-rig")).unwrap();
        std::fs::create_dir_all(temp.path().join(".hidden/crew")).unwrap();

        assert_eq!(
            discover_rigs(&layout).unwrap(),
            vec!["beads", "gastown", "grctool", "niflheim"]
        );
    }

    #[test]
    fn empty_object_registry_is_accepted() {
        let (_temp, layout) = town();
        std::fs::write(layout.rigs_file(), "{}").unwrap();
        let registry = load_registry(&layout).unwrap();
        assert_eq!(registry.version, 1);
        assert!(registry.rigs.is_empty());
        assert!(discover_rigs(&layout).unwrap().is_empty());
    }

    #[test]
    fn registry_keeps_unknown_entry_fields() {
        let (_temp, layout) = town();
        std::fs::write(
            layout.rigs_file(),
            r#"{"version":1,"rigs":{"acme":{"git_url":"u","beads":{"prefix":"ac"}}}}"#,
        )
        .unwrap();
        let registry = load_registry(&layout).unwrap();
        let entry = &registry.rigs["acme"];
        assert_eq!(entry.git_url.as_deref(), Some("u"));
        assert!(entry.extra.contains_key("beads"));
    }

    #[test]
    fn discover_rigs_requires_mayor_dir() {
        let temp = tempdir().unwrap();
        let err = discover_rigs(&TownLayout::new(temp.path())).unwrap_err();
        assert!(matches!(err, WardenError::TownRootNotFound(_)));
    }

    #[test]
    fn malformed_registry_is_an_error() {
        let (_temp, layout) = town();
        std::fs::write(layout.rigs_file(), "{\"rigs\": [").unwrap();
        let err = discover_rigs(&layout).unwrap_err();
        assert!(matches!(err, WardenError::RigRegistryMalformed { .. }));
    }

    #[test]
    fn worker_dirs_lists_crew_and_polecats() {
        let (temp, layout) = town();
        std::fs::create_dir_all(temp.path().join("acme/crew/joe")).unwrap();
        std::fs::create_dir_all(temp.path().join("acme/crew/.cache")).unwrap();
        std::fs::create_dir_all(temp.path().join("acme/polecats/toast")).unwrap();
        std::fs::write(temp.path().join("acme/polecats/README"), "").unwrap();

        let workers = worker_dirs(&layout).unwrap();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].role, WorkerRole::Crew);
        assert_eq!(workers[0].assignee(), "acme/crew/joe");
        assert_eq!(workers[1].role, WorkerRole::Polecat);
        assert_eq!(workers[1].assignee(), "acme/polecats/toast");
    }

    #[test]
    fn worker_for_path_resolves_nested_paths() {
        let layout = TownLayout::new("/town");
        let worker = worker_for_path(&layout, Path::new("/town/acme/polecats/toast/src")).unwrap();
        assert_eq!(worker.rig, "acme");
        assert_eq!(worker.role, WorkerRole::Polecat);
        assert_eq!(worker.path, PathBuf::from("/town/acme/polecats/toast"));

        assert!(worker_for_path(&layout, Path::new("/town/acme")).is_none());
        assert!(worker_for_path(&layout, Path::new("/town/acme/refinery/x")).is_none());
        assert!(worker_for_path(&layout, Path::new("/elsewhere/acme/crew/joe")).is_none());
    }

    #[test]
    fn fill_missing_preserves_existing_fields() {
        let worker = WorkerDir {
            rig: "acme".to_string(),
            role: WorkerRole::Crew,
            name: "joe".to_string(),
            path: PathBuf::from("/town/acme/crew/joe"),
        };
        let mut state = CrewState {
            name: "joseph".to_string(),
            branch: "feature/x".to_string(),
            ..CrewState::default()
        };
        assert_eq!(state.missing_fields(), vec!["rig", "clone_path"]);

        let now = Utc::now();
        state.fill_missing(&worker, now);
        assert_eq!(state.name, "joseph");
        assert_eq!(state.rig, "acme");
        assert_eq!(state.clone_path, "/town/acme/crew/joe");
        assert_eq!(state.branch, "feature/x");
        assert_eq!(state.created_at, Some(now));
        assert!(state.missing_fields().is_empty());
    }
}
