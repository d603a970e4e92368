//! bd-backed `IssueTracker`.
//!
//! The issue tracker is a separate program; we only ever ask it which beads
//! are hooked, and never link against it.

use std::path::PathBuf;
use std::process::Command;

use super::{HookedBead, IssueTracker};
use crate::error::{Result, WardenError};

#[derive(Debug, Clone)]
pub struct BeadsCli {
    /// Directory the tracker runs in (the town root).
    work_dir: PathBuf,
}

impl BeadsCli {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl IssueTracker for BeadsCli {
    fn hooked_beads(&self) -> Result<Vec<HookedBead>> {
        let command = "bd list --status=hooked --json --limit=0";
        let output = Command::new("bd")
            .args(["list", "--status=hooked", "--json", "--limit=0"])
            .current_dir(&self.work_dir)
            .output()
            .map_err(|err| WardenError::CommandFailed {
                command: command.to_string(),
                details: err.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            if stdout.contains("no issues found") {
                return Ok(Vec::new());
            }
            return Err(WardenError::CommandFailed {
                command: command.to_string(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_hooked_beads(&stdout)
    }
}

/// Parses the tracker's JSON listing; empty output, `[]` and `null` are all
/// "no hooked beads".
pub(crate) fn parse_hooked_beads(output: &str) -> Result<Vec<HookedBead>> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|err| WardenError::json("parsing hooked beads", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hooked_beads_reads_listing() {
        let beads = parse_hooked_beads(
            r#"[{"id":"gt-abc","title":"Fix auth","assignee":"acme/polecats/toast","priority":2}]"#,
        )
        .unwrap();
        assert_eq!(beads.len(), 1);
        assert_eq!(beads[0].id, "gt-abc");
        assert_eq!(beads[0].assignee, "acme/polecats/toast");
    }

    #[test]
    fn parse_hooked_beads_treats_empty_output_as_none() {
        assert!(parse_hooked_beads("").unwrap().is_empty());
        assert!(parse_hooked_beads("null\n").unwrap().is_empty());
        assert!(parse_hooked_beads("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_hooked_beads_rejects_garbage() {
        assert!(parse_hooked_beads("not json").is_err());
    }
}
