use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// On-disk lock file (`<worker>/.runtime/agent.lock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub session_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub hostname: Option<String>,
    /// Start time of `pid` (Unix seconds) at acquisition, for PID-reuse detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_started: Option<u64>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// A parsed lock together with the workspace it guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceLock {
    pub workspace_dir: PathBuf,
    pub pid: u32,
    pub session_id: Option<String>,
    pub acquired_at: DateTime<Utc>,
    pub hostname: Option<String>,
    pub proc_started: Option<u64>,
}

impl WorkspaceLock {
    pub fn from_file(workspace_dir: PathBuf, file: LockFile) -> Self {
        Self {
            workspace_dir,
            pid: file.pid,
            session_id: file.session_id,
            acquired_at: file.acquired_at,
            hostname: file.hostname,
            proc_started: file.proc_started,
        }
    }

    /// Session id, or `""` when none was recorded.
    pub fn session(&self) -> &str {
        self.session_id.as_deref().unwrap_or("")
    }
}

/// A lock file that exists but could not be parsed or read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptLock {
    pub path: PathBuf,
    pub error: String,
}

/// Result of scanning a tree for lock files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockScan {
    /// Parsed locks, sorted by workspace.
    pub locks: Vec<WorkspaceLock>,
    /// Files whose content is not a lock.
    pub corrupt: Vec<CorruptLock>,
    /// Files that could not be read at all; their content is unknown.
    pub unreadable: Vec<CorruptLock>,
}

impl LockScan {
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty() && self.corrupt.is_empty() && self.unreadable.is_empty()
    }
}

/// Human-facing state of a single workspace lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    HeldByUs,
    /// PID alive, or PID gone but the session lives on.
    Held { pid: u32, session: String },
    /// PID dead and no live session.
    Stale { pid: u32 },
    Unreadable(String),
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Unlocked => write!(f, "unlocked"),
            LockStatus::HeldByUs => write!(f, "locked (by us)"),
            LockStatus::Held { pid, session } if session.is_empty() => {
                write!(f, "locked by PID {}", pid)
            }
            LockStatus::Held { pid, session } => {
                write!(f, "locked by PID {} (session: {})", pid, session)
            }
            LockStatus::Stale { pid } => write!(f, "stale (dead PID {})", pid),
            LockStatus::Unreadable(err) => write!(f, "error: {}", err),
        }
    }
}
