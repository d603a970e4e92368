//! Crash-recovery checkpoints.
//!
//! A live agent periodically snapshots where it is (molecule step, modified
//! files, branch, hooked bead) into `<worker>/.polecat-checkpoint.json`. When
//! the session dies, its successor reads the checkpoint once to resume.
//!
//! Absent means "no checkpoint"; a file that does not parse is an error and
//! is never silently replaced.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collab::{IssueTracker, Vcs};
use crate::error::{Result, WardenError};
use crate::storage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub molecule_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_step: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step_title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_files: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hooked_bead: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

pub fn path(worker_dir: &Path) -> PathBuf {
    storage::checkpoint_path(worker_dir)
}

pub fn read(worker_dir: &Path) -> Result<Option<Checkpoint>> {
    let path = path(worker_dir);
    let content = match fs_err::read(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(WardenError::io("reading checkpoint", err)),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| WardenError::CheckpointCorrupt { path, source })
}

/// Persists `checkpoint`, filling `timestamp` (now) and `session_id`
/// (`writer_session`, or `pid-<pid>` when that is empty) if unset. Returns
/// what was written.
pub fn write(worker_dir: &Path, mut checkpoint: Checkpoint, writer_session: &str) -> Result<Checkpoint> {
    checkpoint.timestamp.get_or_insert_with(Utc::now);
    if checkpoint.session_id.is_empty() {
        checkpoint.session_id = if writer_session.is_empty() {
            format!("pid-{}", std::process::id())
        } else {
            writer_session.to_string()
        };
    }

    let path = path(worker_dir);
    let json = serde_json::to_vec_pretty(&checkpoint)
        .map_err(|err| WardenError::json("serializing checkpoint", err))?;
    storage::atomic_write(&path, &json)?;
    restrict_permissions(&path)?;
    debug!(path = %path.display(), "Wrote checkpoint");
    Ok(checkpoint)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|err| WardenError::io("restricting checkpoint permissions", err))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Deletes the checkpoint. Absent is fine.
pub fn remove(worker_dir: &Path) -> Result<()> {
    storage::remove_if_exists(&path(worker_dir))?;
    Ok(())
}

/// Snapshots repository state. Each failed query leaves its field empty.
pub fn capture(vcs: &dyn Vcs, worker_dir: &Path) -> Checkpoint {
    let mut checkpoint = Checkpoint {
        timestamp: Some(Utc::now()),
        ..Checkpoint::default()
    };
    match vcs.status(worker_dir) {
        Ok(files) => checkpoint.modified_files = files,
        Err(err) => debug!(error = %err, "Checkpoint capture: no status"),
    }
    match vcs.rev_parse_head(worker_dir) {
        Ok(head) => checkpoint.last_commit = head,
        Err(err) => debug!(error = %err, "Checkpoint capture: no HEAD"),
    }
    match vcs.current_branch(worker_dir) {
        Ok(branch) => checkpoint.branch = branch,
        Err(err) => debug!(error = %err, "Checkpoint capture: no branch"),
    }
    checkpoint
}

impl Checkpoint {
    pub fn with_molecule(mut self, molecule_id: &str, step_id: &str, step_title: &str) -> Self {
        self.molecule_id = molecule_id.to_string();
        self.current_step = step_id.to_string();
        self.step_title = step_title.to_string();
        self
    }

    pub fn with_hooked_bead(mut self, bead_id: &str) -> Self {
        self.hooked_bead = bead_id.to_string();
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }

    /// Age relative to `now`. A checkpoint without a timestamp has no age.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.timestamp.map(|ts| now.signed_duration_since(ts))
    }

    pub fn age(&self) -> Option<Duration> {
        self.age_at(Utc::now())
    }

    /// True at or beyond `threshold`. Untimestamped checkpoints count as stale.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age().map_or(true, |age| age >= threshold)
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.molecule_id.is_empty() {
            if self.current_step.is_empty() {
                parts.push(format!("molecule {}", self.molecule_id));
            } else {
                parts.push(format!("molecule {}, step {}", self.molecule_id, self.current_step));
            }
        }
        if !self.hooked_bead.is_empty() {
            parts.push(format!("hooked: {}", self.hooked_bead));
        }
        if !self.modified_files.is_empty() {
            parts.push(format!("{} modified files", self.modified_files.len()));
        }
        if !self.branch.is_empty() {
            parts.push(format!("branch: {}", self.branch));
        }

        if parts.is_empty() {
            return "no significant state".to_string();
        }
        parts.join(", ")
    }
}

/// Captures and records checkpoints for a running agent.
///
/// Recording is fire-and-forget from the agent's point of view: a failure to
/// checkpoint must never interrupt the work being checkpointed.
pub struct Checkpointer<'a> {
    vcs: &'a dyn Vcs,
    tracker: Option<&'a dyn IssueTracker>,
    session_id: String,
}

impl<'a> Checkpointer<'a> {
    pub fn new(vcs: &'a dyn Vcs, session_id: impl Into<String>) -> Self {
        Self {
            vcs,
            tracker: None,
            session_id: session_id.into(),
        }
    }

    pub fn with_tracker(mut self, tracker: &'a dyn IssueTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Repository snapshot plus the bead hooked to `assignee`, if any.
    pub fn capture_for(&self, worker_dir: &Path, assignee: Option<&str>) -> Checkpoint {
        let checkpoint = capture(self.vcs, worker_dir);
        let (Some(tracker), Some(assignee)) = (self.tracker, assignee) else {
            return checkpoint;
        };
        match tracker.hooked_bead_for(assignee) {
            Ok(Some(bead)) => checkpoint.with_hooked_bead(&bead.id),
            Ok(None) => checkpoint,
            Err(err) => {
                debug!(error = %err, assignee, "Checkpoint capture: no hooked bead");
                checkpoint
            }
        }
    }

    pub fn record(&self, worker_dir: &Path, checkpoint: Checkpoint) -> Result<Checkpoint> {
        write(worker_dir, checkpoint, &self.session_id)
    }

    /// Writes `checkpoint`, logging instead of returning any failure.
    pub fn record_best_effort(&self, worker_dir: &Path, checkpoint: Checkpoint) -> Option<Checkpoint> {
        match self.record(worker_dir, checkpoint) {
            Ok(written) => Some(written),
            Err(err) => {
                warn!(
                    worker = %worker_dir.display(),
                    error = %err,
                    "Failed to record checkpoint"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{FakeIssueTracker, FakeVcs};
    use tempfile::tempdir;

    #[test]
    fn read_absent_checkpoint_is_none() {
        let temp = tempdir().unwrap();
        assert_eq!(read(temp.path()).unwrap(), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempdir().unwrap();
        let checkpoint = Checkpoint {
            modified_files: vec!["src/lib.rs".to_string()],
            branch: "polecat/toast".to_string(),
            ..Checkpoint::default()
        }
        .with_molecule("gt-mol-1", "step-2", "Write tests")
        .with_notes("halfway");

        let written = write(temp.path(), checkpoint.clone(), "%7").unwrap();
        assert_eq!(written.session_id, "%7");
        assert!(written.timestamp.is_some());

        let read_back = read(temp.path()).unwrap().unwrap();
        assert_eq!(read_back, written);
        assert_eq!(
            Checkpoint {
                timestamp: None,
                session_id: String::new(),
                ..read_back
            },
            checkpoint
        );
    }

    #[test]
    fn write_keeps_existing_session_and_timestamp() {
        let temp = tempdir().unwrap();
        let ts = Utc::now() - Duration::hours(3);
        let checkpoint = Checkpoint {
            session_id: "%1".to_string(),
            timestamp: Some(ts),
            ..Checkpoint::default()
        };
        let written = write(temp.path(), checkpoint, "%9").unwrap();
        assert_eq!(written.session_id, "%1");
        assert_eq!(written.timestamp, Some(ts));
    }

    #[test]
    fn write_without_writer_session_uses_pid() {
        let temp = tempdir().unwrap();
        let written = write(temp.path(), Checkpoint::default(), "").unwrap();
        assert_eq!(written.session_id, format!("pid-{}", std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn checkpoint_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempdir().unwrap();
        write(temp.path(), Checkpoint::default(), "%7").unwrap();
        let mode = std::fs::metadata(path(temp.path())).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn empty_fields_are_omitted_on_disk() {
        let temp = tempdir().unwrap();
        write(temp.path(), Checkpoint::default().with_notes("n"), "%7").unwrap();
        let raw = std::fs::read_to_string(path(temp.path())).unwrap();
        assert!(raw.contains("\"notes\""));
        assert!(!raw.contains("molecule_id"));
        assert!(!raw.contains("modified_files"));
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let temp = tempdir().unwrap();
        std::fs::write(path(temp.path()), "{ nope").unwrap();
        let err = read(temp.path()).unwrap_err();
        assert!(matches!(err, WardenError::CheckpointCorrupt { .. }));
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = tempdir().unwrap();
        write(temp.path(), Checkpoint::default(), "%7").unwrap();
        remove(temp.path()).unwrap();
        remove(temp.path()).unwrap();
        assert_eq!(read(temp.path()).unwrap(), None);
    }

    #[test]
    fn capture_tolerates_vcs_failures() {
        let temp = tempdir().unwrap();
        let vcs = FakeVcs {
            head: Some("abc123".to_string()),
            ..FakeVcs::broken()
        };
        let checkpoint = capture(&vcs, temp.path());
        assert_eq!(checkpoint.last_commit, "abc123");
        assert!(checkpoint.branch.is_empty());
        assert!(checkpoint.modified_files.is_empty());
        assert!(checkpoint.timestamp.is_some());
    }

    #[test]
    fn checkpointer_fills_hooked_bead_for_assignee() {
        let temp = tempdir().unwrap();
        let vcs = FakeVcs::new(&["a.rs", "b.rs"], "abc123", "polecat/toast");
        let tracker = FakeIssueTracker::new();
        tracker.hook("gt-42", "acme/polecats/toast");
        tracker.hook("gt-43", "acme/polecats/other");

        let checkpointer = Checkpointer::new(&vcs, "%7").with_tracker(&tracker);
        let checkpoint = checkpointer.capture_for(temp.path(), Some("acme/polecats/toast"));
        assert_eq!(checkpoint.hooked_bead, "gt-42");
        assert_eq!(
            checkpoint.summary(),
            "hooked: gt-42, 2 modified files, branch: polecat/toast"
        );

        tracker.set_unavailable(true);
        let checkpoint = checkpointer.capture_for(temp.path(), Some("acme/polecats/toast"));
        assert!(checkpoint.hooked_bead.is_empty());
    }

    #[test]
    fn record_best_effort_swallows_failures() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let vcs = FakeVcs::broken();
        let checkpointer = Checkpointer::new(&vcs, "%7");

        // The worker "directory" is a regular file, so the write must fail.
        assert!(checkpointer
            .record_best_effort(&blocker, Checkpoint::default())
            .is_none());
        assert!(checkpointer
            .record_best_effort(temp.path(), Checkpoint::default())
            .is_some());
    }

    #[test]
    fn summary_and_staleness() {
        assert_eq!(Checkpoint::default().summary(), "no significant state");
        assert_eq!(
            Checkpoint::default().with_molecule("m1", "", "").summary(),
            "molecule m1"
        );

        let now = Utc::now();
        let old = Checkpoint {
            timestamp: Some(now - Duration::hours(25)),
            ..Checkpoint::default()
        };
        assert_eq!(old.age_at(now), Some(Duration::hours(25)));
        assert!(old.is_stale(Duration::hours(24)));
        assert!(!old.is_stale(Duration::hours(48)));
        assert!(Checkpoint::default().is_stale(Duration::hours(24)));
    }
}
