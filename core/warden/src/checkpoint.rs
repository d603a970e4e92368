//! `warden checkpoint write|show|clear`.

use std::path::Path;

use warden_core::checkpoint;
use warden_core::{worker_for_path, BeadsCli, Checkpointer, GitCli, WardenError};

use crate::{output, Runtime};

pub struct WriteOptions {
    pub molecule: Option<String>,
    pub step: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// Captures git state (and the hooked bead, when the directory is a known
/// worker) and writes it. Unlike an agent's periodic checkpoint, a failure
/// here is reported.
pub fn write(runtime: &Runtime, dir: &Path, options: WriteOptions) -> Result<bool, WardenError> {
    let git = GitCli::new();
    let beads = BeadsCli::new(runtime.layout.root());
    let session = runtime.tmux.current_session().unwrap_or_default();
    let checkpointer = Checkpointer::new(&git, session).with_tracker(&beads);

    let assignee = worker_for_path(&runtime.layout, dir).map(|worker| worker.assignee());
    let mut snapshot = checkpointer.capture_for(dir, assignee.as_deref());
    if let Some(molecule) = &options.molecule {
        snapshot = snapshot.with_molecule(
            molecule,
            options.step.as_deref().unwrap_or_default(),
            options.title.as_deref().unwrap_or_default(),
        );
    }
    if let Some(notes) = &options.notes {
        snapshot = snapshot.with_notes(notes);
    }

    let written = checkpointer.record(dir, snapshot)?;
    println!("Checkpoint written: {}", written.summary());
    Ok(true)
}

pub fn show(dir: &Path, json: bool) -> Result<bool, WardenError> {
    let Some(checkpoint) = checkpoint::read(dir)? else {
        if json {
            println!("null");
        } else {
            println!("No checkpoint in {}", dir.display());
        }
        return Ok(true);
    };

    if json {
        output::print_json(&checkpoint)?;
        return Ok(true);
    }

    println!("{}", checkpoint.summary());
    if let Some(timestamp) = checkpoint.timestamp {
        let age = checkpoint
            .age()
            .map(warden_core::format_age)
            .unwrap_or_default();
        println!("  written: {} ({} ago)", timestamp.to_rfc3339(), age);
    }
    if !checkpoint.session_id.is_empty() {
        println!("  session: {}", checkpoint.session_id);
    }
    if !checkpoint.step_title.is_empty() {
        println!("  step: {}", checkpoint.step_title);
    }
    if !checkpoint.last_commit.is_empty() {
        println!("  last commit: {}", checkpoint.last_commit);
    }
    for file in &checkpoint.modified_files {
        println!("  modified: {}", file);
    }
    if !checkpoint.notes.is_empty() {
        println!("  notes: {}", checkpoint.notes);
    }
    Ok(true)
}

pub fn clear(dir: &Path) -> Result<bool, WardenError> {
    checkpoint::remove(dir)?;
    println!("Checkpoint cleared");
    Ok(true)
}
