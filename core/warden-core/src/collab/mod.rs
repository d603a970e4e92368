//! Collaborator interfaces for the external tools the reconciler depends on.
//!
//! Each capability is a narrow trait with one shell-out adapter and one
//! in-memory fake (see `fakes`, behind the `test-helpers` feature):
//!
//! | Trait            | Adapter        | Tool  |
//! |------------------|----------------|-------|
//! | `SessionManager` | `TmuxCli`      | tmux  |
//! | `Vcs`            | `GitCli`       | git   |
//! | `IssueTracker`   | `BeadsCli`     | bd    |
//!
//! Implementors should:
//! - Return `Err` when the tool could not answer; an empty answer must mean
//!   "nothing there", never "couldn't look"
//! - Stay synchronous; callers wrap a whole doctor run if they need a timeout

mod beads;
#[cfg(any(test, feature = "test-helpers"))]
pub mod fakes;
mod git;
mod tmux;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::TerminationTarget;
use crate::error::Result;

pub use beads::BeadsCli;
pub use git::{parse_porcelain, GitCli};
pub use tmux::{parse_session_ids, TmuxCli};

/// The multiplexer's session table.
pub trait SessionManager: Send + Sync {
    /// Names of all live sessions.
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Map of session name → session id (e.g. `"gt-acme-witness" → "$7"`).
    fn list_session_ids(&self) -> Result<HashMap<String, String>>;

    /// Exact-name existence check.
    fn has_session(&self, name: &str) -> Result<bool>;

    /// PIDs of the processes running in the session's panes.
    fn pane_pids(&self, name: &str) -> Result<Vec<u32>>;

    /// Kills a session. Only accepts targets that passed crew protection.
    fn terminate(&self, target: &TerminationTarget) -> Result<()>;
}

/// Version-control queries used for checkpoint capture.
pub trait Vcs: Send + Sync {
    /// Paths with uncommitted modifications.
    fn status(&self, dir: &Path) -> Result<Vec<String>>;

    /// SHA of HEAD.
    fn rev_parse_head(&self, dir: &Path) -> Result<String>;

    /// Short name of the checked-out branch.
    fn current_branch(&self, dir: &Path) -> Result<String>;
}

/// A tracked work item currently hooked to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookedBead {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub assignee: String,
}

/// The external issue tracker.
pub trait IssueTracker: Send + Sync {
    /// All work items with hooked status.
    fn hooked_beads(&self) -> Result<Vec<HookedBead>>;

    /// The bead hooked to `assignee` (e.g. `"acme/polecats/toast"`), if any.
    fn hooked_bead_for(&self, assignee: &str) -> Result<Option<HookedBead>> {
        Ok(self
            .hooked_beads()?
            .into_iter()
            .find(|bead| bead.assignee == assignee))
    }
}
