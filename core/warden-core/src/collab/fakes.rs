//! In-memory collaborators for tests.
//!
//! The fakes record every mutation so tests can assert on side effects
//! (which sessions were terminated) instead of on return codes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{HookedBead, IssueTracker, SessionManager, Vcs};
use crate::classify::TerminationTarget;
use crate::error::{Result, WardenError};
use crate::process::{ProcessEntry, ProcessProbe};

fn unavailable(command: &str) -> WardenError {
    WardenError::CommandFailed {
        command: command.to_string(),
        details: "fake collaborator marked unavailable".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Session table keyed by name, with the multiplexer id of each session.
#[derive(Debug, Default)]
pub struct FakeSessionManager {
    sessions: Mutex<BTreeMap<String, String>>,
    panes: Mutex<HashMap<String, Vec<u32>>>,
    terminated: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl FakeSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, id)` pairs.
    pub fn with_sessions<'a>(sessions: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fake = Self::new();
        for (name, id) in sessions {
            fake.add_session(name, id);
        }
        fake
    }

    pub fn add_session(&self, name: &str, id: &str) {
        self.sessions
            .lock()
            .unwrap()
            .insert(name.to_string(), id.to_string());
    }

    pub fn remove_session(&self, name: &str) {
        self.sessions.lock().unwrap().remove(name);
        self.panes.lock().unwrap().remove(name);
    }

    /// Sets the PIDs reported for a session's panes.
    pub fn set_pane_pids(&self, name: &str, pids: &[u32]) {
        self.panes
            .lock()
            .unwrap()
            .insert(name.to_string(), pids.to_vec());
    }

    /// Makes every query fail, as if the multiplexer could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names passed to `terminate`, in call order.
    pub fn terminated(&self) -> Vec<String> {
        self.terminated.lock().unwrap().clone()
    }

    fn check_available(&self, command: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable(command));
        }
        Ok(())
    }
}

impl SessionManager for FakeSessionManager {
    fn list_sessions(&self) -> Result<Vec<String>> {
        self.check_available("list-sessions")?;
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }

    fn list_session_ids(&self) -> Result<HashMap<String, String>> {
        self.check_available("list-sessions")?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect())
    }

    fn has_session(&self, name: &str) -> Result<bool> {
        self.check_available("has-session")?;
        Ok(self.sessions.lock().unwrap().contains_key(name))
    }

    fn pane_pids(&self, name: &str) -> Result<Vec<u32>> {
        self.check_available("list-panes")?;
        if !self.sessions.lock().unwrap().contains_key(name) {
            return Err(WardenError::CommandFailed {
                command: "list-panes".to_string(),
                details: format!("can't find session: {}", name),
            });
        }
        Ok(self
            .panes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn terminate(&self, target: &TerminationTarget) -> Result<()> {
        self.check_available("kill-session")?;
        self.sessions.lock().unwrap().remove(target.name());
        self.panes.lock().unwrap().remove(target.name());
        self.terminated
            .lock()
            .unwrap()
            .push(target.name().to_string());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Processes
// ─────────────────────────────────────────────────────────────────────────────

/// Process table holding the set of live PIDs and optional start times.
#[derive(Debug, Default)]
pub struct FakeProcessProbe {
    alive: Mutex<HashSet<u32>>,
    start_times: Mutex<HashMap<u32, u64>>,
    table: Mutex<BTreeMap<u32, ProcessEntry>>,
    unavailable: AtomicBool,
}

impl FakeProcessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alive(pids: impl IntoIterator<Item = u32>) -> Self {
        let fake = Self::new();
        for pid in pids {
            fake.spawn(pid);
        }
        fake
    }

    pub fn spawn(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }

    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
        self.table.lock().unwrap().remove(&pid);
    }

    /// Adds a live, named process to the process table.
    pub fn spawn_named(&self, pid: u32, parent: u32, name: &str) {
        self.spawn(pid);
        self.table.lock().unwrap().insert(
            pid,
            ProcessEntry {
                pid,
                parent: Some(parent),
                name: name.to_string(),
            },
        );
    }

    /// Makes process table listing fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_start_time(&self, pid: u32, started: u64) {
        self.start_times.lock().unwrap().insert(pid, started);
    }
}

impl ProcessProbe for FakeProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        if !self.is_alive(pid) {
            return None;
        }
        self.start_times.lock().unwrap().get(&pid).copied()
    }

    fn processes(&self) -> Result<Vec<ProcessEntry>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("ps"));
        }
        Ok(self.table.lock().unwrap().values().cloned().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Version Control
// ─────────────────────────────────────────────────────────────────────────────

/// Canned repository state; `None` fields make the matching query fail.
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    pub modified: Option<Vec<String>>,
    pub head: Option<String>,
    pub branch: Option<String>,
}

impl FakeVcs {
    pub fn new(modified: &[&str], head: &str, branch: &str) -> Self {
        Self {
            modified: Some(modified.iter().map(|s| s.to_string()).collect()),
            head: Some(head.to_string()),
            branch: Some(branch.to_string()),
        }
    }

    /// A VCS where every query fails (not a repository).
    pub fn broken() -> Self {
        Self::default()
    }
}

impl Vcs for FakeVcs {
    fn status(&self, _dir: &Path) -> Result<Vec<String>> {
        self.modified.clone().ok_or_else(|| unavailable("git status"))
    }

    fn rev_parse_head(&self, _dir: &Path) -> Result<String> {
        self.head.clone().ok_or_else(|| unavailable("git rev-parse HEAD"))
    }

    fn current_branch(&self, _dir: &Path) -> Result<String> {
        self.branch
            .clone()
            .ok_or_else(|| unavailable("git rev-parse --abbrev-ref HEAD"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Issue Tracker
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeIssueTracker {
    hooked: Mutex<Vec<HookedBead>>,
    unavailable: AtomicBool,
}

impl FakeIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(&self, id: &str, assignee: &str) {
        self.hooked.lock().unwrap().push(HookedBead {
            id: id.to_string(),
            title: String::new(),
            assignee: assignee.to_string(),
        });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl IssueTracker for FakeIssueTracker {
    fn hooked_beads(&self) -> Result<Vec<HookedBead>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("bd list --status=hooked"));
        }
        Ok(self.hooked.lock().unwrap().clone())
    }
}
