//! PID liveness probing.
//!
//! Lock files record the PID of the process that acquired them. That process
//! is usually a short-lived spawner, so a dead PID says nothing on its own
//! about whether the agent is alive; callers combine it with session liveness
//! (see [`crate::identity`]).
//!
//! # PID Reuse
//!
//! Operating systems recycle PIDs. Locks written by this crate also record
//! `proc_started` (process start time, seconds since epoch). When present, a
//! live PID whose start time differs by more than [`START_TIME_TOLERANCE_SECS`]
//! is treated as dead: it belongs to an unrelated process.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, System};

use crate::error::Result;

/// Allowed drift between the recorded and observed process start time.
pub const START_TIME_TOLERANCE_SECS: u64 = 2;

// Per-PID refresh keeps lookups O(1) instead of scanning the whole process table.
thread_local! {
    static SYSTEM_CACHE: RefCell<Option<System>> = const { RefCell::new(None) };
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent: Option<u32>,
    pub name: String,
}

/// Capability for asking the OS about processes.
pub trait ProcessProbe: Send + Sync {
    /// True when a process with this PID currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Process start time (Unix seconds), if the process exists and can be queried.
    fn start_time(&self, _pid: u32) -> Option<u64> {
        None
    }

    /// Liveness with PID-reuse detection against an optional recorded start time.
    fn is_alive_verified(&self, pid: u32, recorded_start: Option<u64>) -> bool {
        if !self.is_alive(pid) {
            return false;
        }
        let Some(expected) = recorded_start else {
            return true;
        };
        match self.start_time(pid) {
            Some(actual) => actual.abs_diff(expected) <= START_TIME_TOLERANCE_SECS,
            // Alive but unqueryable: don't guess it was recycled.
            None => true,
        }
    }

    /// Every process visible to this user.
    fn processes(&self) -> Result<Vec<ProcessEntry>>;
}

/// Production probe backed by `kill(pid, 0)` and sysinfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessProbe;

impl ProcessProbe for SystemProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        process_start_time(pid)
    }

    fn processes(&self) -> Result<Vec<ProcessEntry>> {
        let mut sys = System::new();
        sys.refresh_processes();
        Ok(sys
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                parent: process.parent().map(Pid::as_u32),
                name: process.name().to_string(),
            })
            .collect())
    }
}

/// Walks the parent chain of `pid` looking for any of `ancestors`. The walk
/// is bounded so a corrupt table cannot loop.
pub fn has_ancestor(pid: u32, parents: &HashMap<u32, u32>, ancestors: &HashSet<u32>) -> bool {
    let mut current = pid;
    for _ in 0..64 {
        if ancestors.contains(&current) {
            return true;
        }
        match parents.get(&current) {
            Some(&parent) if parent != current => current = parent,
            _ => return false,
        }
    }
    false
}

/// Signal-0 liveness check.
///
/// `EPERM` means the process exists but belongs to another user, which still
/// counts as alive.
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(unix)]
    {
        let Ok(raw_pid) = i32::try_from(pid) else {
            return false;
        };
        // SAFETY: kill(pid, 0) is a standard POSIX liveness check; it delivers no signal.
        #[allow(unsafe_code)]
        let result = unsafe { libc::kill(raw_pid, 0) };
        if result == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        process_start_time(pid).is_some()
    }
}

/// Get the start time of a process (Unix timestamp, seconds).
pub fn process_start_time(pid: u32) -> Option<u64> {
    SYSTEM_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let sys = cache.get_or_insert_with(System::new);

        let sysinfo_pid = Pid::from_u32(pid);
        sys.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new());
        sys.process(sysinfo_pid).map(|process| process.start_time())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        alive: bool,
        started: Option<u64>,
    }

    impl ProcessProbe for FixedProbe {
        fn is_alive(&self, _pid: u32) -> bool {
            self.alive
        }

        fn start_time(&self, _pid: u32) -> Option<u64> {
            self.started
        }

        fn processes(&self) -> Result<Vec<ProcessEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn absurd_pid_is_dead() {
        assert!(!is_pid_alive(99_999_999));
        assert!(!is_pid_alive(0));
    }

    #[test]
    fn current_process_has_start_time() {
        assert!(process_start_time(std::process::id()).is_some());
    }

    #[test]
    fn verified_liveness_detects_recycled_pid() {
        let probe = FixedProbe {
            alive: true,
            started: Some(1_700_000_100),
        };
        assert!(!probe.is_alive_verified(4821, Some(1_700_000_000)));
        assert!(probe.is_alive_verified(4821, Some(1_700_000_099)));
        assert!(probe.is_alive_verified(4821, None));
    }

    #[test]
    fn verified_liveness_trusts_unqueryable_live_pid() {
        let probe = FixedProbe {
            alive: true,
            started: None,
        };
        assert!(probe.is_alive_verified(4821, Some(1_700_000_000)));
    }

    #[test]
    fn system_process_table_includes_current_process() {
        let table = SystemProcessProbe.processes().unwrap();
        assert!(table.iter().any(|entry| entry.pid == std::process::id()));
    }

    #[test]
    fn has_ancestor_follows_parent_chain() {
        let parents: HashMap<u32, u32> = [(30, 20), (20, 10), (10, 1), (1, 0)].into_iter().collect();
        let panes: HashSet<u32> = [10].into_iter().collect();
        assert!(has_ancestor(30, &parents, &panes));
        assert!(has_ancestor(10, &parents, &panes));
        assert!(!has_ancestor(1, &parents, &panes));
        assert!(!has_ancestor(99, &parents, &panes));
    }

    #[test]
    fn verified_liveness_of_dead_pid_is_false() {
        let probe = FixedProbe {
            alive: false,
            started: Some(1_700_000_000),
        };
        assert!(!probe.is_alive_verified(4821, Some(1_700_000_000)));
    }
}
