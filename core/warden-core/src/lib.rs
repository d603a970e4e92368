//! # warden-core
//!
//! Self-healing reconciliation for a fleet of agent workspaces. Finds stale
//! workspace locks and orphaned multiplexer sessions, cleans up what is
//! provably dead, and records crash-recovery checkpoints for the rest.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. One doctor run is a sequence of short
//!   probes against local state and tmux.
//! - **Snapshots, not truth**: Everything read may be out of date by the time
//!   a fix acts, so fixes re-validate each item right before mutating it.
//! - **Fail closed**: A collaborator that cannot answer produces an error,
//!   never an empty answer that would make live things look dead.
//! - **Crew is untouchable**: Session termination only accepts a
//!   [`TerminationTarget`], which cannot be built for a crew session.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden_core::{CheckContext, Doctor, DoctorConfig, SystemProcessProbe, TmuxCli, TownLayout};
//!
//! let layout = TownLayout::new("/home/me/gt");
//! let config = warden_core::load_config(&layout.config_file())?;
//! let ctx = CheckContext {
//!     layout: &layout,
//!     config: &config,
//!     sessions: &TmuxCli::new(),
//!     processes: &SystemProcessProbe,
//!     current_session: None,
//! };
//! let report = Doctor::with_default_checks().run(&ctx);
//! ```

pub mod checkpoint;
pub mod classify;
pub mod collab;
pub mod config;
pub mod doctor;
pub mod error;
pub mod identity;
pub mod keepalive;
pub mod liveness;
pub mod lock;
pub mod process;
pub mod storage;
pub mod town;

pub use checkpoint::{Checkpoint, Checkpointer};
pub use classify::{
    is_crew_session, is_fleet_session, ClassifiedSession, SessionClassification,
    SessionClassifier, TerminationTarget,
};
pub use collab::{BeadsCli, GitCli, HookedBead, IssueTracker, SessionManager, TmuxCli, Vcs};
pub use config::{load_config, CheckpointPolicy, DoctorConfig, RuntimeProcesses, SessionNaming};
pub use doctor::{
    Check, CheckCategory, CheckContext, CheckResult, CheckStatus, Doctor, FixAttempt, FixOutcome,
    FixRun, Report, Summary,
};
pub use error::{Result, WardenError};
pub use identity::{IdentityReconciler, LockClassification, LockFinding, Reconciliation};
pub use keepalive::{format_age, Keepalive, KeepaliveState};
pub use liveness::{LiveSession, LiveSessionSet, SessionLivenessOracle};
pub use lock::{LockScan, LockStatus, WorkspaceLock, WorkspaceLockFile};
pub use process::{ProcessEntry, ProcessProbe, SystemProcessProbe};
pub use storage::TownLayout;
pub use town::{discover_rigs, worker_dirs, worker_for_path, WorkerDir, WorkerRole};
