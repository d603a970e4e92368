//! Best-effort activity signal.
//!
//! Each command run inside a workspace stamps
//! `<workspace>/.runtime/keepalive.json` with what ran and when. Nothing
//! depends on the file for correctness; doctor output uses its age to give
//! humans a hint about whether an orphaned lock's agent is still doing
//! anything.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WardenError;
use crate::storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepaliveState {
    pub last_command: String,
    pub timestamp: DateTime<Utc>,
}

impl KeepaliveState {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }
}

/// Writer and reader for keepalive files. Writes never fail the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keepalive;

impl Keepalive {
    pub fn touch(&self, workspace: &Path, command: &str) {
        let state = KeepaliveState {
            last_command: command.to_string(),
            timestamp: Utc::now(),
        };
        let path = storage::keepalive_path(workspace);
        let result = serde_json::to_vec(&state)
            .map_err(|err| WardenError::json("serializing keepalive", err))
            .and_then(|json| storage::atomic_write(&path, &json));
        if let Err(err) = result {
            debug!(path = %path.display(), error = %err, "Keepalive write skipped");
        }
    }

    /// `None` when the file is missing or unreadable.
    pub fn read(&self, workspace: &Path) -> Option<KeepaliveState> {
        let content = fs_err::read_to_string(storage::keepalive_path(workspace)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// `"3m"`, `"2h"`, `"4d"`: coarse age for report details.
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}
