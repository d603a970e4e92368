//! Doctor configuration loading.
//!
//! Reads `mayor/doctor.toml` when present. Every field has a default, so a
//! missing file (the common case) yields `DoctorConfig::default()`. A file that
//! exists but does not parse is an error: a half-read config could shrink the
//! set of recognized sessions and turn live agents into orphans.
//!
//! ```toml
//! [sessions]
//! mayor = "hq-mayor"
//! deacon = "hq-deacon"
//!
//! [checkpoints]
//! stale_after_hours = 24
//!
//! [processes]
//! runtime_names = ["claude"]
//! ```

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DoctorConfig {
    pub sessions: SessionNaming,
    pub checkpoints: CheckpointPolicy,
    pub processes: RuntimeProcesses,
}

/// Names of the town-level singleton sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionNaming {
    pub mayor: String,
    pub deacon: String,
}

impl Default for SessionNaming {
    fn default() -> Self {
        Self {
            mayor: "hq-mayor".to_string(),
            deacon: "hq-deacon".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointPolicy {
    /// Checkpoints at or beyond this age are reported as stale.
    pub stale_after_hours: u32,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            stale_after_hours: 24,
        }
    }
}

impl CheckpointPolicy {
    pub fn stale_after(&self) -> Duration {
        Duration::hours(i64::from(self.stale_after_hours))
    }
}

/// Process names that count as agent runtimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeProcesses {
    pub runtime_names: Vec<String>,
}

impl Default for RuntimeProcesses {
    fn default() -> Self {
        Self {
            runtime_names: vec!["claude".to_string()],
        }
    }
}

impl RuntimeProcesses {
    pub fn is_runtime(&self, process_name: &str) -> bool {
        self.runtime_names.iter().any(|name| name == process_name)
    }
}

/// Loads the doctor config from `path`, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<DoctorConfig> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DoctorConfig::default());
        }
        Err(err) => return Err(WardenError::io("reading doctor config", err)),
    };

    toml::from_str::<DoctorConfig>(&content).map_err(|err| WardenError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
