//! git-backed `Vcs`.

use std::path::Path;
use std::process::Command;

use super::Vcs;
use crate::error::{Result, WardenError};

#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|err| WardenError::CommandFailed {
                command: command.clone(),
                details: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(WardenError::CommandFailed {
                command,
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Vcs for GitCli {
    fn status(&self, dir: &Path) -> Result<Vec<String>> {
        self.run(dir, &["status", "--porcelain"])
            .map(|output| parse_porcelain(&output))
    }

    fn rev_parse_head(&self, dir: &Path) -> Result<String> {
        self.run(dir, &["rev-parse", "HEAD"])
            .map(|output| output.trim().to_string())
    }

    fn current_branch(&self, dir: &Path) -> Result<String> {
        self.run(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .map(|output| output.trim().to_string())
    }
}

/// Extracts file paths from `git status --porcelain` output (`XY path`).
///
/// Renames (`R  old -> new`) report the new path.
pub fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .filter_map(|line| {
            let path = line.get(3..)?.trim();
            let path = path.rsplit(" -> ").next().unwrap_or(path).trim();
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_porcelain_extracts_paths() {
        let output = " M src/lib.rs\n?? notes.txt\nA  new/file.rs\n";
        assert_eq!(
            parse_porcelain(output),
            vec!["src/lib.rs", "notes.txt", "new/file.rs"]
        );
    }

    #[test]
    fn parse_porcelain_uses_rename_destination() {
        let output = "R  old/name.rs -> new/name.rs\n";
        assert_eq!(parse_porcelain(output), vec!["new/name.rs"]);
    }

    #[test]
    fn parse_porcelain_ignores_short_and_empty_lines() {
        assert!(parse_porcelain("\n M\n").is_empty());
        assert!(parse_porcelain("").is_empty());
    }

    #[test]
    fn git_outside_repository_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(GitCli::new().rev_parse_head(temp.path()).is_err());
    }
}
