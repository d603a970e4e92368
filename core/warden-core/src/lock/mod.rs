//! Per-workspace lock files.
//!
//! Every worker directory may hold `.runtime/agent.lock`, written when an
//! agent claims the workspace:
//!
//! ```json
//! {
//!   "pid": 4821,
//!   "acquired_at": "2026-01-05T10:00:00Z",
//!   "session_id": "%7",
//!   "hostname": "devbox",
//!   "proc_started": 1767607200
//! }
//! ```
//!
//! `session_id`, `hostname` and `proc_started` are optional; an empty
//! `session_id` reads as absent.
//!
//! Whether a lock is still valid is never stored. It is derived each time
//! from PID liveness ([`is_stale`]) joined with session liveness
//! ([`crate::identity`]).

mod store;
mod types;

pub use store::{find_all, is_stale, WorkspaceLockFile};
pub(crate) use store::read_lock_file;
pub use types::{CorruptLock, LockFile, LockScan, LockStatus, WorkspaceLock};
