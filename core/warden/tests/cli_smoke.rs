//! Runs the built binary against a throwaway town.
//!
//! tmux is pointed at a nonexistent binary via PATH so results never depend
//! on the machine's real sessions.

use std::path::Path;
use std::process::{Command, Output};

fn warden(town: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_warden"))
        .args(args)
        .env("WARDEN_TOWN_ROOT", town)
        .env("PATH", town.join("no-such-bin"))
        .env_remove("TMUX")
        .env_remove("WARDEN_LOG")
        .env_remove("WARDEN_DEBUG_LOG")
        .output()
        .expect("failed to run warden")
}

fn town() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(temp.path().join("mayor")).unwrap();
    std::fs::create_dir_all(temp.path().join("acme/polecats/toast")).unwrap();
    temp
}

#[test]
fn test_checkpoint_write_show_clear() {
    let town = town();
    let worker = town.path().join("acme/polecats/toast");
    let dir = worker.to_str().unwrap();

    let output = warden(
        town.path(),
        &["checkpoint", "write", "--dir", dir, "--molecule", "mol-1", "--step", "s2", "--notes", "halfway"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(worker.join(".polecat-checkpoint.json").exists());

    let output = warden(town.path(), &["checkpoint", "show", "--dir", dir, "--json"]);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["molecule_id"], "mol-1");
    assert_eq!(shown["current_step"], "s2");
    assert_eq!(shown["notes"], "halfway");
    assert!(shown["timestamp"].is_string());
    assert!(shown["session_id"].as_str().unwrap().starts_with("pid-"));

    let output = warden(town.path(), &["checkpoint", "clear", "--dir", dir]);
    assert!(output.status.success());
    assert!(!worker.join(".polecat-checkpoint.json").exists());

    let output = warden(town.path(), &["checkpoint", "show", "--dir", dir]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("No checkpoint"));
}

#[test]
fn test_doctor_json_reports_every_check() {
    let town = town();
    let output = warden(town.path(), &["doctor", "--json"]);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["total"], 6);
    let names: Vec<_> = report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|check| check["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "identity-collision",
            "orphan-sessions",
            "zombie-sessions",
            "orphan-processes",
            "crew-state",
            "checkpoints",
        ]
    );
    // No tmux: session-dependent checks degrade to warnings, not errors.
    assert_eq!(report["summary"]["error"], 0);
    assert!(output.status.success());
}

#[test]
fn test_doctor_exits_nonzero_on_errors() {
    let town = town();
    let crew = town.path().join("acme/crew/joe");
    std::fs::create_dir_all(&crew).unwrap();
    std::fs::write(crew.join("state.json"), "{broken").unwrap();

    let output = warden(town.path(), &["doctor"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme/joe: invalid JSON in state.json"));
}

#[test]
fn test_malformed_config_is_fatal() {
    let town = town();
    std::fs::write(town.path().join("mayor/doctor.toml"), "[sessions\n").unwrap();

    let output = warden(town.path(), &["doctor"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("doctor.toml"));
}
