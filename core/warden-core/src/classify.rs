//! Session name classification and crew protection.
//!
//! Fleet session names come in two shapes:
//!
//! - town singletons: `hq-mayor`, `hq-deacon`, and the `gt-boot` watchdog
//! - rig agents: `gt-<rig>-<role>[-<member>]`
//!
//! The suffix after `gt-` is split into at most three parts on `-`, so a rig
//! name can never contain a hyphen: `gt-my-rig-witness` parses as rig `my`,
//! role `rig`, member `witness`.
//!
//! Crew sessions (`gt-<rig>-crew-<member>`) hold human-supervised work and are
//! never terminated automatically, whether or not their rig is registered.
//! [`TerminationTarget`] is the only way to name a session for termination,
//! and it cannot be built for a crew session.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::SessionNaming;

/// Prefix of rig-level agent sessions.
pub const RIG_PREFIX: &str = "gt-";
/// Prefix of town-level sessions.
pub const TOWN_PREFIX: &str = "hq-";
/// The boot watchdog, a town singleton living under the rig prefix.
pub const BOOT_SESSION: &str = "gt-boot";

/// `gt-<rig>-crew-<member>`; the rig part can't contain a hyphen.
static CREW_SESSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^gt-([^-]+)-crew-(.+)$").unwrap());

/// True for any crew session name, registered rig or not.
pub fn is_crew_session(name: &str) -> bool {
    CREW_SESSION.is_match(name)
}

/// True when the name carries a fleet prefix; everything else belongs to the
/// user and is ignored by orphan detection.
pub fn is_fleet_session(name: &str) -> bool {
    name.starts_with(RIG_PREFIX) || name.starts_with(TOWN_PREFIX)
}

/// A parsed `gt-<rig>-<role>[-<member>]` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigSessionName<'a> {
    pub rig: &'a str,
    pub role: &'a str,
    pub member: Option<&'a str>,
}

/// Parses a rig session name. Returns `None` for anything shorter than
/// `gt-<rig>-<role>` or with an empty part.
pub fn parse_rig_session(name: &str) -> Option<RigSessionName<'_>> {
    let suffix = name.strip_prefix(RIG_PREFIX)?;
    let mut parts = suffix.splitn(3, '-');
    let rig = parts.next().filter(|part| !part.is_empty())?;
    let role = parts.next().filter(|part| !part.is_empty())?;
    let member = parts.next();
    if member == Some("") {
        return None;
    }
    Some(RigSessionName { rig, role, member })
}

/// Decides whether a session name belongs to a known rig or singleton role.
pub fn is_valid_session(name: &str, valid_rigs: &[String], mayor: &str, deacon: &str) -> bool {
    if name == mayor || name == deacon || name == BOOT_SESSION {
        return true;
    }

    let Some(parsed) = parse_rig_session(name) else {
        return false;
    };
    if !valid_rigs.iter().any(|rig| rig == parsed.rig) {
        return false;
    }

    match (parsed.role, parsed.member) {
        ("witness" | "refinery", None) => true,
        ("crew", member) => member.is_some(),
        // Polecats use arbitrary names: gt-<rig>-<name>[-<more>].
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionClassification {
    Valid,
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedSession {
    pub name: String,
    pub classification: SessionClassification,
    /// Crew sessions are protected regardless of classification.
    pub protected: bool,
}

impl ClassifiedSession {
    pub fn is_orphan(&self) -> bool {
        self.classification == SessionClassification::Orphan
    }
}

/// Classifies live fleet sessions against the registered rigs.
#[derive(Debug, Clone)]
pub struct SessionClassifier {
    valid_rigs: Vec<String>,
    mayor: String,
    deacon: String,
}

impl SessionClassifier {
    pub fn new(valid_rigs: Vec<String>, naming: &SessionNaming) -> Self {
        Self {
            valid_rigs,
            mayor: naming.mayor.clone(),
            deacon: naming.deacon.clone(),
        }
    }

    pub fn classify(&self, name: &str) -> ClassifiedSession {
        let classification =
            if is_valid_session(name, &self.valid_rigs, &self.mayor, &self.deacon) {
                SessionClassification::Valid
            } else {
                SessionClassification::Orphan
            };
        ClassifiedSession {
            name: name.to_string(),
            classification,
            protected: is_crew_session(name),
        }
    }

    /// Classifies every fleet session in `names`, preserving order and
    /// skipping non-fleet names.
    pub fn classify_all<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<ClassifiedSession> {
        names
            .into_iter()
            .filter(|name| is_fleet_session(name))
            .map(|name| self.classify(name))
            .collect()
    }
}

/// A session name that has been proven not to be a crew session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationTarget(String);

impl TerminationTarget {
    /// Returns `None` for crew sessions.
    pub fn new(name: &str) -> Option<Self> {
        if is_crew_session(name) {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rigs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn crew_pattern_matches_only_crew_sessions() {
        let cases = [
            ("gt-gastown-crew-joe", true),
            ("gt-niflheim-crew-codex1", true),
            ("gt-7thsense-crew-ss1", true),
            ("gt-a-crew-b", true),
            ("gt-gastown-witness", false),
            ("gt-gastown-refinery", false),
            ("gt-gastown-polecat-abc", false),
            ("hq-deacon", false),
            ("hq-mayor", false),
            ("gt-gastown-crew", false),
            ("gt-crew-max", false),
            ("crew-gastown-max", false),
            ("other-session", false),
            ("", false),
            ("gt", false),
            ("gt-", false),
            ("gt-gastown", false),
        ];
        for (name, want) in cases {
            assert_eq!(is_crew_session(name), want, "is_crew_session({name:?})");
        }
    }

    #[test]
    fn valid_sessions_against_registered_rigs() {
        let valid = rigs(&["gastown", "beads"]);
        let cases = [
            ("hq-mayor", true),
            ("hq-deacon", true),
            ("gt-boot", true),
            ("gt-gastown-witness", true),
            ("gt-gastown-refinery", true),
            ("gt-gastown-polecat1", true),
            ("gt-beads-crew-max", true),
            ("gt-gastown-abc123def", true),
            ("gt-gastown-fix-auth-bug", true),
            ("gt-unknown-witness", false),
            ("gt-foo-refinery", false),
            ("gt-only", false),
            ("gt-gastown-crew", false),
            ("other-session", false),
        ];
        for (name, want) in cases {
            assert_eq!(
                is_valid_session(name, &valid, "hq-mayor", "hq-deacon"),
                want,
                "is_valid_session({name:?})"
            );
        }
    }

    #[test]
    fn witness_with_member_is_still_a_worker_name() {
        // gt-<rig>-witness-x is a polecat named "witness-x", not a malformed witness.
        let valid = rigs(&["acme"]);
        assert!(is_valid_session("gt-acme-witness-x", &valid, "hq-mayor", "hq-deacon"));
    }

    #[test]
    fn hyphenated_rig_names_are_not_supported() {
        let valid = rigs(&["my-rig"]);
        assert!(!is_valid_session("gt-my-rig-witness", &valid, "hq-mayor", "hq-deacon"));

        let parsed = parse_rig_session("gt-my-rig-witness").unwrap();
        assert_eq!(parsed.rig, "my");
        assert_eq!(parsed.role, "rig");
        assert_eq!(parsed.member, Some("witness"));
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!(parse_rig_session("gt-only").is_none());
        assert!(parse_rig_session("gt--witness").is_none());
        assert!(parse_rig_session("gt-acme-").is_none());
        assert!(parse_rig_session("gt-acme-crew-").is_none());
        assert!(parse_rig_session("hq-mayor").is_none());
    }

    #[test]
    fn custom_singleton_names_are_honored() {
        let naming = SessionNaming {
            mayor: "hq-boss".to_string(),
            deacon: "hq-deacon".to_string(),
        };
        let classifier = SessionClassifier::new(Vec::new(), &naming);
        assert!(!classifier.classify("hq-boss").is_orphan());
        assert!(classifier.classify("hq-mayor").is_orphan());
    }

    #[test]
    fn classify_all_skips_user_sessions_and_marks_crew() {
        let classifier = SessionClassifier::new(rigs(&["gastown"]), &SessionNaming::default());
        let classified = classifier.classify_all([
            "gt-gastown-witness",
            "random-session",
            "gt-acme-crew-joe",
            "gt-unknown-witness",
        ]);

        let names: Vec<_> = classified.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["gt-gastown-witness", "gt-acme-crew-joe", "gt-unknown-witness"]
        );
        assert!(!classified[0].is_orphan());
        assert!(classified[1].is_orphan());
        assert!(classified[1].protected);
        assert!(classified[2].is_orphan());
        assert!(!classified[2].protected);
    }

    #[test]
    fn termination_target_refuses_crew() {
        assert!(TerminationTarget::new("gt-acme-crew-joe").is_none());
        assert!(TerminationTarget::new("gt-niflheim-crew-codex1").is_none());
        let target = TerminationTarget::new("gt-unknown-witness").unwrap();
        assert_eq!(target.name(), "gt-unknown-witness");
    }
}
