use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sysinfo::System;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::types::{CorruptLock, LockFile, LockScan, LockStatus, WorkspaceLock};
use crate::error::{Result, WardenError};
use crate::liveness::LiveSessionSet;
use crate::process::ProcessProbe;
use crate::storage::{self, LOCK_FILE};

/// Walks `root` for `<worker>/.runtime/agent.lock` files.
///
/// Unreadable entries below the root are skipped; an unreadable root is an
/// error. `.git` directories are never descended into.
pub fn find_all(root: &Path) -> Result<LockScan> {
    fs_err::read_dir(root).map_err(|e| WardenError::io("scanning for locks", e))?;

    let mut scan = LockScan::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable entry during lock scan");
                continue;
            }
        };
        if entry.file_name() != LOCK_FILE || entry.file_type().is_symlink() {
            continue;
        }
        let Some(workspace_dir) = storage::worker_dir_for_lock(entry.path()) else {
            continue;
        };

        match read_lock_file(entry.path()) {
            Ok(Some(file)) => scan.locks.push(WorkspaceLock::from_file(workspace_dir, file)),
            // Removed between listing and reading.
            Ok(None) => {}
            Err(err @ WardenError::InvalidLock { .. }) => {
                warn!(path = %entry.path().display(), error = %err, "Corrupt lock file");
                scan.corrupt.push(CorruptLock {
                    path: entry.path().to_path_buf(),
                    error: err.to_string(),
                });
            }
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "Unreadable lock file");
                scan.unreadable.push(CorruptLock {
                    path: entry.path().to_path_buf(),
                    error: err.to_string(),
                });
            }
        }
    }

    scan.locks.sort_by(|a, b| a.workspace_dir.cmp(&b.workspace_dir));
    scan.corrupt.sort_by(|a, b| a.path.cmp(&b.path));
    scan.unreadable.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scan)
}

/// PID-staleness: the recorded process is gone, or its PID now belongs to a
/// different process.
///
/// This alone does not make a lock dead. The recording process is usually a
/// spawner that exits once the agent is running; see [`crate::identity`].
pub fn is_stale(lock: &WorkspaceLock, probe: &dyn ProcessProbe) -> bool {
    !probe.is_alive_verified(lock.pid, lock.proc_started)
}

/// Reads and parses a lock file. Absent is `Ok(None)`; anything that fails to
/// parse is `InvalidLock`; a read failure is `Io`.
pub(crate) fn read_lock_file(path: &Path) -> Result<Option<LockFile>> {
    let content = match fs_err::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(WardenError::io("reading lock file", err)),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|err| WardenError::InvalidLock {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
}

/// The lock guarding a single workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceLockFile {
    workspace_dir: PathBuf,
    path: PathBuf,
}

impl WorkspaceLockFile {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        let workspace_dir = workspace_dir.into();
        let path = storage::lock_path(&workspace_dir);
        Self {
            workspace_dir,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn read(&self) -> Result<Option<WorkspaceLock>> {
        Ok(read_lock_file(&self.path)?
            .map(|file| WorkspaceLock::from_file(self.workspace_dir.clone(), file)))
    }

    /// Claims the workspace for this process.
    ///
    /// - no lock: write one
    /// - lock held by this process: refresh it
    /// - PID dead and session gone: take it over
    /// - anything else: `Locked`
    pub fn acquire(
        &self,
        session_id: Option<&str>,
        probe: &dyn ProcessProbe,
        live: &LiveSessionSet,
    ) -> Result<WorkspaceLock> {
        if let Some(existing) = self.read()? {
            if existing.pid == std::process::id() {
                debug!(path = %self.path.display(), "Refreshing our own lock");
                return self.write(session_id, probe);
            }
            if !is_dead(&existing, probe, live) {
                return Err(locked_error(&existing));
            }
            info!(
                path = %self.path.display(),
                pid = existing.pid,
                "Taking over dead lock"
            );
            self.force_release()?;
        }
        self.write(session_id, probe)
    }

    /// Removes the lock if this process holds it. Absent is fine.
    pub fn release(&self) -> Result<()> {
        match self.read()? {
            None => Ok(()),
            Some(existing) if existing.pid == std::process::id() => self.force_release(),
            Some(existing) => Err(locked_error(&existing)),
        }
    }

    /// Removes the lock regardless of holder.
    pub fn force_release(&self) -> Result<()> {
        if storage::remove_if_exists(&self.path)? {
            info!(path = %self.path.display(), "Removed lock");
        }
        Ok(())
    }

    pub fn status(&self, probe: &dyn ProcessProbe, live: &LiveSessionSet) -> LockStatus {
        let existing = match self.read() {
            Ok(Some(existing)) => existing,
            Ok(None) => return LockStatus::Unlocked,
            Err(err) => return LockStatus::Unreadable(err.to_string()),
        };
        if existing.pid == std::process::id() {
            return LockStatus::HeldByUs;
        }
        if is_dead(&existing, probe, live) {
            return LockStatus::Stale { pid: existing.pid };
        }
        LockStatus::Held {
            pid: existing.pid,
            session: existing.session().to_string(),
        }
    }

    fn write(&self, session_id: Option<&str>, probe: &dyn ProcessProbe) -> Result<WorkspaceLock> {
        let pid = std::process::id();
        let file = LockFile {
            pid,
            acquired_at: Utc::now(),
            session_id: session_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            hostname: System::host_name(),
            proc_started: probe.start_time(pid),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|err| WardenError::json("serializing lock file", err))?;
        storage::atomic_write(&self.path, &json)?;
        Ok(WorkspaceLock::from_file(self.workspace_dir.clone(), file))
    }
}

fn is_dead(lock: &WorkspaceLock, probe: &dyn ProcessProbe, live: &LiveSessionSet) -> bool {
    is_stale(lock, probe) && !live.contains(lock.session())
}

fn locked_error(lock: &WorkspaceLock) -> WardenError {
    WardenError::Locked {
        pid: lock.pid,
        session: lock.session().to_string(),
        acquired_at: lock.acquired_at.to_rfc3339(),
    }
}
