//! Error types for warden-core operations.

use std::path::PathBuf;

/// All errors that can occur in warden-core operations.
///
/// Checks never surface these directly: `Check::run` folds them into a
/// Warning or Error result. They propagate out of fixes, lock operations and
/// checkpoint I/O.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    // ─────────────────────────────────────────────────────────────────────
    // Town Layout Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Town root not found at {0} (missing mayor/ directory)")]
    TownRootNotFound(PathBuf),

    #[error("Rig registry malformed: {path}: {details}")]
    RigRegistryMalformed { path: PathBuf, details: String },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Lock Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Workspace is locked by another agent: PID {pid} (session: {session}, acquired: {acquired_at})")]
    Locked {
        pid: u32,
        session: String,
        acquired_at: String,
    },

    #[error("Invalid lock file: {path}: {details}")]
    InvalidLock { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Checkpoint Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Checkpoint corrupt: {path}: {source}")]
    CheckpointCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Doctor Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Check does not support auto-fix: {0}")]
    CannotFix(String),

    #[error("Fix incomplete for {check}: {details}")]
    FixIncomplete { check: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },
}

/// Convenience type alias for Results using WardenError.
pub type Result<T> = std::result::Result<T, WardenError>;

impl WardenError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        WardenError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        WardenError::Json {
            context: context.into(),
            source,
        }
    }
}
