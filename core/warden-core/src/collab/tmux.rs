//! tmux-backed `SessionManager`.

use std::collections::HashMap;
use std::process::Command;

use tracing::{debug, info};

use super::SessionManager;
use crate::classify::TerminationTarget;
use crate::error::{Result, WardenError};

/// Shells out to the `tmux` binary.
#[derive(Debug, Clone)]
pub struct TmuxCli {
    tmux_path: String,
}

impl Default for TmuxCli {
    fn default() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
        }
    }
}

impl TmuxCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(tmux_path: impl Into<String>) -> Self {
        Self {
            tmux_path: tmux_path.into(),
        }
    }

    /// Name of the session this process runs in, when inside tmux.
    pub fn current_session(&self) -> Option<String> {
        std::env::var_os("TMUX")?;
        let output = self.run(&["display-message", "-p", "#S"]).ok()??;
        let name = output.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Runs tmux and returns stdout. `Ok(None)` means the server has no
    /// sessions (or is not running), which is a real answer rather than a
    /// failure.
    fn run(&self, args: &[&str]) -> Result<Option<String>> {
        let command = format!("{} {}", self.tmux_path, args.join(" "));
        let output = Command::new(&self.tmux_path)
            .args(args)
            .output()
            .map_err(|err| WardenError::CommandFailed {
                command: command.clone(),
                details: err.to_string(),
            })?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_empty_server_message(&stderr) {
            debug!(command = %command, "tmux server has no sessions");
            return Ok(None);
        }

        Err(WardenError::CommandFailed {
            command,
            details: stderr.trim().to_string(),
        })
    }
}

/// Only a missing server counts as "no sessions". A socket that exists but
/// cannot be reached (permissions, another user's socket) is a failure.
fn is_empty_server_message(stderr: &str) -> bool {
    if stderr.contains("no server running") || stderr.contains("no sessions") {
        return true;
    }
    stderr.contains("error connecting to") && stderr.contains("(No such file or directory)")
}

impl SessionManager for TmuxCli {
    fn list_sessions(&self) -> Result<Vec<String>> {
        let Some(output) = self.run(&["list-sessions", "-F", "#{session_name}"])? else {
            return Ok(Vec::new());
        };
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn list_session_ids(&self) -> Result<HashMap<String, String>> {
        let Some(output) = self.run(&["list-sessions", "-F", "#{session_name}:#{session_id}"])?
        else {
            return Ok(HashMap::new());
        };
        Ok(parse_session_ids(&output))
    }

    fn has_session(&self, name: &str) -> Result<bool> {
        // "=" forces an exact match; tmux otherwise matches by prefix, so
        // "hq-deacon" would match a running "hq-deacon-boot".
        let target = format!("={}", name);
        let status = Command::new(&self.tmux_path)
            .args(["has-session", "-t", &target])
            .output()
            .map_err(|err| WardenError::CommandFailed {
                command: format!("{} has-session -t {}", self.tmux_path, target),
                details: err.to_string(),
            })?
            .status;
        Ok(status.success())
    }

    fn pane_pids(&self, name: &str) -> Result<Vec<u32>> {
        let target = format!("={}", name);
        let Some(output) = self.run(&["list-panes", "-s", "-t", &target, "-F", "#{pane_pid}"])?
        else {
            return Ok(Vec::new());
        };
        Ok(output
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }

    fn terminate(&self, target: &TerminationTarget) -> Result<()> {
        let exact = format!("={}", target.name());
        self.run(&["kill-session", "-t", &exact])?;
        info!(session = %target.name(), "Terminated session");
        Ok(())
    }
}

/// Parses `name:id` lines from `list-sessions -F "#{session_name}:#{session_id}"`.
///
/// Splits on the first colon only; ids never contain one.
pub fn parse_session_ids(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| {
            let (name, id) = line.split_once(':')?;
            let (name, id) = (name.trim(), id.trim());
            if name.is_empty() || id.is_empty() {
                return None;
            }
            Some((name.to_string(), id.to_string()))
        })
        .collect()
}
