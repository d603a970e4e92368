//! `warden sessions`: every live fleet session with its classification.

use warden_core::{discover_rigs, SessionClassifier, SessionManager, WardenError};

use crate::{output, Runtime};

pub fn run(runtime: &Runtime, json: bool) -> Result<bool, WardenError> {
    let rigs = discover_rigs(&runtime.layout)?;
    let names = runtime.tmux.list_sessions()?;
    let classifier = SessionClassifier::new(rigs, &runtime.config.sessions);
    let classified = classifier.classify_all(names.iter().map(String::as_str));

    if json {
        output::print_json(&classified)?;
        return Ok(true);
    }

    if classified.is_empty() {
        println!("No fleet sessions running");
        return Ok(true);
    }
    for session in &classified {
        let label = if session.is_orphan() { "orphan" } else { "valid" };
        let suffix = if session.protected { "  (crew, protected)" } else { "" };
        println!("{:<7} {}{}", label, session.name, suffix);
    }
    Ok(true)
}
