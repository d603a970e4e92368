//! Session liveness as seen by the multiplexer.
//!
//! Lock files record a session identifier in one of two notations: `$N` (the
//! session id tmux prints for `#{session_id}`) or `%N` (the pane-style id some
//! spawners record). Both name the same session. A [`LiveSessionSet`] holds
//! every live name and every id in both notations, so membership tests work
//! whichever notation a lock used.
//!
//! Listing failures propagate. An unreachable multiplexer must never look like
//! an empty one, or every lock would appear stale.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::collab::SessionManager;
use crate::error::Result;

static SESSION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([$%])(\d+)$").unwrap());

/// A live session as reported at observation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSession {
    pub name: String,
    pub session_id: Option<String>,
}

/// The other notation for a session id: `$55` ↔ `%55`.
///
/// Returns `None` for anything that is not a sigil followed by digits.
pub fn alternate_id(id: &str) -> Option<String> {
    let caps = SESSION_ID.captures(id)?;
    let sigil = if &caps[1] == "$" { '%' } else { '$' };
    Some(format!("{}{}", sigil, &caps[2]))
}

/// Normalized membership set of live session names and ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSessionSet {
    members: HashSet<String>,
    session_count: usize,
}

impl LiveSessionSet {
    pub fn from_sessions(sessions: &[LiveSession]) -> Self {
        let mut members = HashSet::new();
        for session in sessions {
            members.insert(session.name.clone());
            if let Some(id) = session.session_id.as_deref() {
                members.insert(id.to_string());
                if let Some(alt) = alternate_id(id) {
                    members.insert(alt);
                }
            }
        }
        Self {
            members,
            session_count: sessions.len(),
        }
    }

    /// Name-only set, for callers that have no ids.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let sessions: Vec<LiveSession> = names
            .into_iter()
            .map(|name| LiveSession {
                name: name.to_string(),
                session_id: None,
            })
            .collect();
        Self::from_sessions(&sessions)
    }

    /// True when `identifier` is a live session name or id (either notation).
    pub fn contains(&self, identifier: &str) -> bool {
        !identifier.is_empty() && self.members.contains(identifier)
    }

    /// Number of live sessions observed.
    pub fn len(&self) -> usize {
        self.session_count
    }

    pub fn is_empty(&self) -> bool {
        self.session_count == 0
    }
}

/// Queries a [`SessionManager`] for live sessions.
pub struct SessionLivenessOracle<'a> {
    sessions: &'a dyn SessionManager,
}

impl<'a> SessionLivenessOracle<'a> {
    pub fn new(sessions: &'a dyn SessionManager) -> Self {
        Self { sessions }
    }

    pub fn list_session_names(&self) -> Result<Vec<String>> {
        self.sessions.list_sessions()
    }

    pub fn list_session_ids(&self) -> Result<HashMap<String, String>> {
        self.sessions.list_session_ids()
    }

    /// Live sessions with their ids, sorted by name.
    pub fn live_sessions(&self) -> Result<Vec<LiveSession>> {
        let names = self.list_session_names()?;
        let mut ids = self.list_session_ids()?;

        let mut sessions: Vec<LiveSession> = names
            .into_iter()
            .map(|name| {
                let session_id = ids.remove(&name);
                LiveSession { name, session_id }
            })
            .collect();
        // A session created between the two listings still counts.
        sessions.extend(ids.into_iter().map(|(name, id)| LiveSession {
            name,
            session_id: Some(id),
        }));
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sessions)
    }

    pub fn snapshot(&self) -> Result<LiveSessionSet> {
        let sessions = self.live_sessions()?;
        debug!(sessions = sessions.len(), "Observed live sessions");
        Ok(LiveSessionSet::from_sessions(&sessions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::FakeSessionManager;

    #[test]
    fn alternate_id_swaps_notation() {
        assert_eq!(alternate_id("$55").as_deref(), Some("%55"));
        assert_eq!(alternate_id("%55").as_deref(), Some("$55"));
        assert_eq!(alternate_id("55"), None);
        assert_eq!(alternate_id("$"), None);
        assert_eq!(alternate_id("gt-acme-witness"), None);
    }

    #[test]
    fn id_normalization_is_symmetric() {
        let live = LiveSessionSet::from_sessions(&[LiveSession {
            name: "gt-acme-witness".to_string(),
            session_id: Some("%55".to_string()),
        }]);
        assert!(live.contains("%55"));
        assert!(live.contains("$55"));
        assert!(live.contains("gt-acme-witness"));
        assert!(!live.contains("$56"));
        assert!(!live.contains(""));
    }

    #[test]
    fn snapshot_joins_names_and_ids() {
        let fake = FakeSessionManager::with_sessions([("gt-acme-witness", "$7"), ("hq-mayor", "$0")]);
        let oracle = SessionLivenessOracle::new(&fake);

        let sessions = oracle.live_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "gt-acme-witness");
        assert_eq!(sessions[0].session_id.as_deref(), Some("$7"));

        let live = oracle.snapshot().unwrap();
        assert_eq!(live.len(), 2);
        assert!(live.contains("%7"));
        assert!(live.contains("hq-mayor"));
    }

    #[test]
    fn failed_listing_is_an_error_not_an_empty_set() {
        let fake = FakeSessionManager::with_sessions([("gt-acme-witness", "$7")]);
        fake.set_unavailable(true);
        let oracle = SessionLivenessOracle::new(&fake);
        assert!(oracle.snapshot().is_err());
    }

    #[test]
    fn empty_server_is_an_empty_set() {
        let fake = FakeSessionManager::new();
        let live = SessionLivenessOracle::new(&fake).snapshot().unwrap();
        assert!(live.is_empty());
    }
}
