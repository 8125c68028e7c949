//! End-to-end tests of the harrow binary.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Writes only inserts and updates, so every injected row stays visible.
const APPEND_ONLY: &str = r#"
[selector.operation_weights]
insert = 3
update = 1
insert_with_statics = 0
update_with_statics = 0
delete_row = 0
delete_partition = 0
delete_columns = 0
delete_columns_with_statics = 0
delete_range = 0
delete_slice = 0
"#;

/// Runs a subcommand against `project`, isolated from the user's config.
fn harrow(project: &TempDir, args: &[&str]) -> Command {
    let mut command = Command::cargo_bin("harrow").unwrap();
    command
        .env_remove("RUST_LOG")
        .env("HOME", project.path())
        .env("XDG_CONFIG_HOME", project.path().join("xdg"))
        .args(args)
        .args(["--project", project.path().to_str().unwrap()]);
    command
}

// ============================================================================
// Argument Parsing
// ============================================================================

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("harrow")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deterministic consistency testing"));
}

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("harrow")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn seed_must_be_a_number() {
    Command::cargo_bin("harrow")
        .unwrap()
        .args(["run", "--seed", "seven"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_prints_defaults_as_toml() {
    let project = TempDir::new().unwrap();
    harrow(&project, &["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[run]"))
        .stdout(predicate::str::contains("failure_policy = \"fail-fast\""));
}

#[test]
fn config_text_reflects_project_file() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("harrow.toml"), "[run]\nseed = 31337\n").unwrap();

    harrow(&project, &["config", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seed: 31337"));
}

#[test]
fn environment_overrides_project_file() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("harrow.toml"), "[run]\nseed = 1\n").unwrap();

    harrow(&project, &["config"])
        .env("HARROW_RUN__SEED", "5")
        .assert()
        .success()
        .stdout(predicate::str::contains("seed = 5"));
}

#[test]
fn invalid_config_is_reported() {
    let project = TempDir::new().unwrap();
    let file = project.path().join("bad.toml");
    fs::write(&file, "[partitions]\nslide_after_repeats = 0\n").unwrap();

    harrow(&project, &["config", "--config", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn run_visits_every_lts() {
    let project = TempDir::new().unwrap();
    harrow(&project, &["run", "--seed", "3", "--max-lts", "300", "--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Visited 300 lts"));
}

#[test]
fn run_writes_the_operation_log() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("harrow.toml"),
        "[log]\noperation_log = \"operations.log\"\n",
    )
    .unwrap();

    harrow(&project, &["run", "--max-lts", "50"])
        .assert()
        .success();

    let log = fs::read_to_string(project.path().join("operations.log")).unwrap();
    assert_eq!(log.lines().filter(|l| l.ends_with("Finished")).count(), 50);
    assert!(log.contains("Statement INSERT INTO harrow.table0"));
}

#[test]
fn corruption_is_detected() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("harrow.toml"), APPEND_ONLY).unwrap();

    harrow(&project, &["run", "--seed", "11", "--max-lts", "200", "--corrupt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Corruption self-check (AddExtraRow): 10 detected"));
}

#[test]
fn hidden_rows_are_detected() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("harrow.toml"),
        format!("{APPEND_ONLY}\n[validation]\ncorrupt = true\ncorruptor = \"hide-row\"\npartitions = 4\n"),
    )
    .unwrap();

    harrow(&project, &["run", "--max-lts", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(HideRow): 4 detected"));
}
