//! `warden locks list|clean`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use warden_core::lock::{self, CorruptLock};
use warden_core::{IdentityReconciler, LockClassification, WardenError};

use crate::{display_path, output, Runtime};

#[derive(Debug, Serialize)]
struct LockRow {
    workspace: String,
    pid: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    session_id: String,
    acquired_at: DateTime<Utc>,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct LockListing<'a> {
    locks: Vec<LockRow>,
    corrupt: &'a [CorruptLock],
    unreadable: &'a [CorruptLock],
}

/// Lists every lock. Liveness shows as `unknown` when tmux cannot be asked.
pub fn list(runtime: &Runtime, json: bool) -> Result<bool, WardenError> {
    let scan = lock::find_all(runtime.layout.root())?;
    let reconciler = IdentityReconciler::new(&runtime.processes, &runtime.tmux);
    let live = match reconciler.snapshot() {
        Ok(live) => Some(live),
        Err(err) => {
            warn!(error = %err, "Session listing failed; lock liveness unknown");
            None
        }
    };

    let rows: Vec<LockRow> = scan
        .locks
        .iter()
        .map(|lock| {
            let (state, reason) = match live.as_ref().map(|live| reconciler.classify_lock(lock, live)) {
                Some(LockClassification::Healthy) => ("healthy", None),
                Some(LockClassification::Stale { reason }) => ("stale", Some(reason)),
                Some(LockClassification::Orphaned { reason }) => ("orphaned", Some(reason)),
                None => ("unknown", None),
            };
            LockRow {
                workspace: display_path(&runtime.layout, &lock.workspace_dir).into_owned(),
                pid: lock.pid,
                session_id: lock.session().to_string(),
                acquired_at: lock.acquired_at,
                state,
                reason,
            }
        })
        .collect();

    if json {
        output::print_json(&LockListing {
            locks: rows,
            corrupt: &scan.corrupt,
            unreadable: &scan.unreadable,
        })?;
    } else if scan.is_empty() {
        println!("No worker locks found");
    } else {
        for row in &rows {
            let session = if row.session_id.is_empty() {
                "-"
            } else {
                row.session_id.as_str()
            };
            let mut line = format!(
                "{:<10} {}  pid {}  session {}  since {}",
                row.state,
                row.workspace,
                row.pid,
                session,
                row.acquired_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(reason) = &row.reason {
                line.push_str(&format!("  ({})", reason));
            }
            println!("{}", line);
        }
        let problems = scan
            .corrupt
            .iter()
            .map(|lock| ("corrupt", lock))
            .chain(scan.unreadable.iter().map(|lock| ("unreadable", lock)));
        for (label, lock) in problems {
            println!(
                "{:<10} {}  {}",
                label,
                display_path(&runtime.layout, &lock.path),
                lock.error
            );
        }
    }

    Ok(scan.corrupt.is_empty())
}

/// Removes stale locks, refusing to act if sessions cannot be listed.
pub fn clean(runtime: &Runtime) -> Result<bool, WardenError> {
    let reconciler = IdentityReconciler::new(&runtime.processes, &runtime.tmux);
    let removed = reconciler.clean(runtime.layout.root())?;
    println!("Removed {} stale lock(s)", removed);
    Ok(true)
}
