//! Check/fix diagnostics over the town.
//!
//! A [`Check`] inspects one invariant and reports a [`CheckResult`]. Fixable
//! checks cache what `run` discovered (which locks are stale, which sessions
//! are orphaned) and `fix` consumes that cache, re-validating each item just
//! before it mutates anything. Fixes are idempotent: with nothing cached they
//! do nothing.
//!
//! [`Doctor`] holds the ordered registry of checks and aggregates their
//! results into a [`Report`].

mod checks;
mod engine;

use serde::Serialize;

use crate::collab::SessionManager;
use crate::config::DoctorConfig;
use crate::error::{Result, WardenError};
use crate::process::ProcessProbe;
use crate::storage::TownLayout;

pub use checks::{
    CheckpointCheck, CrewStateCheck, IdentityCollisionCheck, OrphanProcessCheck,
    OrphanSessionCheck, ZombieSessionCheck,
};
pub use engine::{Doctor, FixAttempt, FixOutcome, FixRun, Report, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckCategory {
    Infrastructure,
    Cleanup,
    Recovery,
}

/// Output of one check run.
///
/// `name`, `category` and `fixable` are stamped by the engine from the check
/// that produced the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    pub fixable: bool,
}

impl CheckResult {
    fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            category: CheckCategory::Infrastructure,
            status,
            message: message.into(),
            details: Vec::new(),
            fix_hint: None,
            fixable: status != CheckStatus::Ok,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Marks the finding as needing a human; `fix` would change nothing.
    pub fn not_fixable(mut self) -> Self {
        self.fixable = false;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Everything a check may consult or act through.
pub struct CheckContext<'a> {
    pub layout: &'a TownLayout,
    pub config: &'a DoctorConfig,
    pub sessions: &'a dyn SessionManager,
    pub processes: &'a dyn ProcessProbe,
    /// The session running the doctor; never terminated.
    pub current_session: Option<String>,
}

impl<'a> CheckContext<'a> {
    pub fn is_current_session(&self, name: &str) -> bool {
        self.current_session.as_deref() == Some(name)
    }
}

pub trait Check: Send {
    /// Stable identifier, e.g. `"identity-collision"`.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn category(&self) -> CheckCategory;

    fn can_fix(&self) -> bool {
        false
    }

    /// Never panics; collaborator failures become a Warning result.
    fn run(&mut self, ctx: &CheckContext<'_>) -> CheckResult;

    /// Acts on state cached by the last `run`.
    fn fix(&mut self, _ctx: &CheckContext<'_>) -> Result<()> {
        Err(WardenError::CannotFix(self.name().to_string()))
    }
}
