//! Identity reconciliation: joins workspace locks against live sessions.
//!
//! The PID in a lock is usually the spawner, which exits once the agent is
//! running inside its session. The session is the real liveness signal:
//!
//! | PID   | session recorded & live | classification |
//! |-------|-------------------------|----------------|
//! | dead  | yes                     | Healthy        |
//! | dead  | no                      | Stale          |
//! | alive | recorded but not live   | Orphaned       |
//! | alive | otherwise               | Healthy        |
//!
//! Only Stale locks are ever removed automatically. Orphaned locks have a
//! live process behind them and are reported for a human to look at.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collab::SessionManager;
use crate::error::{Result, WardenError};
use crate::liveness::{LiveSessionSet, SessionLivenessOracle};
use crate::lock::{self, WorkspaceLock};
use crate::process::ProcessProbe;
use crate::storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LockClassification {
    Healthy,
    Stale { reason: String },
    Orphaned { reason: String },
}

/// A lock that needs attention, with the reason it was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockFinding {
    pub lock: WorkspaceLock,
    pub reason: String,
}

impl LockFinding {
    /// `"<workspace> (<reason>)"`, as shown in reports.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.lock.workspace_dir.display(), self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub healthy: Vec<WorkspaceLock>,
    pub stale: Vec<LockFinding>,
    pub orphaned: Vec<LockFinding>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.orphaned.is_empty()
    }
}

pub struct IdentityReconciler<'a> {
    probe: &'a dyn ProcessProbe,
    sessions: &'a dyn SessionManager,
}

impl<'a> IdentityReconciler<'a> {
    pub fn new(probe: &'a dyn ProcessProbe, sessions: &'a dyn SessionManager) -> Self {
        Self { probe, sessions }
    }

    /// Current live-session set. Fails when the multiplexer can't be asked.
    pub fn snapshot(&self) -> Result<LiveSessionSet> {
        SessionLivenessOracle::new(self.sessions).snapshot()
    }

    pub fn classify_lock(&self, lock: &WorkspaceLock, live: &LiveSessionSet) -> LockClassification {
        let session_exists = live.contains(lock.session());

        if lock::is_stale(lock, self.probe) {
            if session_exists {
                return LockClassification::Healthy;
            }
            return LockClassification::Stale {
                reason: format!("dead PID {}", lock.pid),
            };
        }

        match lock.session_id.as_deref() {
            Some(id) if !session_exists => LockClassification::Orphaned {
                reason: format!("PID {}, missing session {}", lock.pid, id),
            },
            _ => LockClassification::Healthy,
        }
    }

    pub fn classify(&self, locks: &[WorkspaceLock], live: &LiveSessionSet) -> Reconciliation {
        let mut result = Reconciliation::default();
        for lock in locks {
            match self.classify_lock(lock, live) {
                LockClassification::Healthy => result.healthy.push(lock.clone()),
                LockClassification::Stale { reason } => result.stale.push(LockFinding {
                    lock: lock.clone(),
                    reason,
                }),
                LockClassification::Orphaned { reason } => result.orphaned.push(LockFinding {
                    lock: lock.clone(),
                    reason,
                }),
            }
        }
        result
    }

    /// Removes `cached` only if the file on disk is still the same lock and
    /// it is still doubly dead against `live`. Returns whether it was removed.
    pub fn revalidate_and_remove(&self, cached: &WorkspaceLock, live: &LiveSessionSet) -> Result<bool> {
        let path = storage::lock_path(&cached.workspace_dir);
        let Some(file) = lock::read_lock_file(&path)? else {
            debug!(path = %path.display(), "Lock already gone");
            return Ok(false);
        };
        let current = WorkspaceLock::from_file(cached.workspace_dir.clone(), file);

        if current.pid != cached.pid
            || current.session_id != cached.session_id
            || current.acquired_at != cached.acquired_at
        {
            info!(path = %path.display(), pid = current.pid, "Lock was re-acquired, leaving it");
            return Ok(false);
        }
        if !matches!(self.classify_lock(&current, live), LockClassification::Stale { .. }) {
            info!(path = %path.display(), pid = current.pid, "Lock is no longer stale, leaving it");
            return Ok(false);
        }

        let removed = storage::remove_if_exists(&path)?;
        if removed {
            info!(path = %path.display(), pid = current.pid, "Removed stale lock");
        }
        Ok(removed)
    }

    /// Re-validates and removes each stale finding. Keeps going past
    /// individual failures and reports them together.
    pub fn remove_stale(&self, stale: &[LockFinding], live: &LiveSessionSet) -> Result<usize> {
        let mut removed = 0;
        let mut failures = Vec::new();
        for finding in stale {
            match self.revalidate_and_remove(&finding.lock, live) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        workspace = %finding.lock.workspace_dir.display(),
                        error = %err,
                        "Failed to remove stale lock"
                    );
                    failures.push(format!("{}: {}", finding.lock.workspace_dir.display(), err));
                }
            }
        }
        if !failures.is_empty() {
            return Err(WardenError::FixIncomplete {
                check: "stale lock cleanup".to_string(),
                details: failures.join("; "),
            });
        }
        Ok(removed)
    }

    /// Scans `root`, classifies every lock against a fresh session snapshot
    /// and removes the stale ones. Returns how many were removed.
    pub fn clean(&self, root: &Path) -> Result<usize> {
        let live = self.snapshot()?;
        let scan = lock::find_all(root)?;
        let reconciliation = self.classify(&scan.locks, &live);
        self.remove_stale(&reconciliation.stale, &live)
    }
}
