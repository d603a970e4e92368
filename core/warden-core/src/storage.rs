//! Town layout and path management.
//!
//! `TownLayout` centralizes every path the reconciler reads or writes, both
//! town-wide (`mayor/rigs.json`, `mayor/doctor.toml`) and per worker
//! (`.runtime/agent.lock`, `.runtime/keepalive.json`, the checkpoint file).
//!
//! ```text
//! <town>/
//! ├── mayor/
//! │   ├── rigs.json          # rig registry
//! │   └── doctor.toml        # optional DoctorConfig
//! └── <rig>/
//!     ├── crew/<name>/       # persistent workers
//!     │   ├── state.json
//!     │   └── .runtime/agent.lock
//!     └── polecats/<name>/   # ephemeral workers
//!         ├── .polecat-checkpoint.json
//!         └── .runtime/{agent.lock,keepalive.json}
//! ```
//!
//! Tests build a layout with `TownLayout::new(tempdir)`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, WardenError};

/// Per-worker runtime directory name.
pub const RUNTIME_DIR: &str = ".runtime";
/// Lock file name inside the runtime directory.
pub const LOCK_FILE: &str = "agent.lock";
/// Keepalive file name inside the runtime directory.
pub const KEEPALIVE_FILE: &str = "keepalive.json";
/// Checkpoint file name inside the worker directory.
pub const CHECKPOINT_FILE: &str = ".polecat-checkpoint.json";
/// Town-level coordinator directory; its presence marks a town root.
pub const MAYOR_DIR: &str = "mayor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownLayout {
    root: PathBuf,
}

impl TownLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walks up from `start` looking for a directory that contains `mayor/`.
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(MAYOR_DIR).is_dir())
            .map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Town Files
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn mayor_dir(&self) -> PathBuf {
        self.root.join(MAYOR_DIR)
    }

    /// Path to mayor/rigs.json (rig registry).
    pub fn rigs_file(&self) -> PathBuf {
        self.mayor_dir().join("rigs.json")
    }

    /// Path to mayor/doctor.toml (doctor configuration).
    pub fn config_file(&self) -> PathBuf {
        self.mayor_dir().join("doctor.toml")
    }

    /// Town-level runtime directory (keepalive for the town itself, logs).
    pub fn town_runtime_dir(&self) -> PathBuf {
        runtime_dir(&self.root)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.town_runtime_dir().join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Rig Directories
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn rig_dir(&self, rig: &str) -> PathBuf {
        self.root.join(rig)
    }

    pub fn crew_dir(&self, rig: &str) -> PathBuf {
        self.rig_dir(rig).join("crew")
    }

    pub fn polecats_dir(&self, rig: &str) -> PathBuf {
        self.rig_dir(rig).join("polecats")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Files
// ─────────────────────────────────────────────────────────────────────────────

pub fn runtime_dir(worker_dir: &Path) -> PathBuf {
    worker_dir.join(RUNTIME_DIR)
}

pub fn lock_path(worker_dir: &Path) -> PathBuf {
    runtime_dir(worker_dir).join(LOCK_FILE)
}

pub fn keepalive_path(worker_dir: &Path) -> PathBuf {
    runtime_dir(worker_dir).join(KEEPALIVE_FILE)
}

pub fn checkpoint_path(worker_dir: &Path) -> PathBuf {
    worker_dir.join(CHECKPOINT_FILE)
}

/// Inverse of [`lock_path`]: returns the worker directory for a lock file
/// path, or `None` when the path is not `<worker>/.runtime/agent.lock`.
pub fn worker_dir_for_lock(lock_file: &Path) -> Option<PathBuf> {
    if lock_file.file_name()? != LOCK_FILE {
        return None;
    }
    let runtime = lock_file.parent()?;
    if runtime.file_name()? != RUNTIME_DIR {
        return None;
    }
    runtime.parent().map(Path::to_path_buf)
}

/// Writes `contents` to a temp file beside `path`, then renames it into
/// place. Creates the parent directory if needed.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs_err::create_dir_all(dir).map_err(|e| WardenError::io("creating parent directory", e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WardenError::Io {
        context: format!("creating temp file in {}", dir.display()),
        source: e,
    })?;
    tmp.write_all(contents).map_err(|e| WardenError::Io {
        context: format!("writing temp file for {}", path.display()),
        source: e,
    })?;
    tmp.flush().map_err(|e| WardenError::Io {
        context: format!("flushing temp file for {}", path.display()),
        source: e,
    })?;
    tmp.persist(path).map_err(|e| WardenError::Io {
        context: format!("persisting temp file to {}", path.display()),
        source: e.error,
    })?;
    Ok(())
}

/// Removes a file, treating "already gone" as success. Returns whether a
/// file was actually removed.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs_err::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(WardenError::io("removing file", err)),
    }
}
