//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary data directory
fn cli_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("converse").expect("Failed to find converse binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

/// Create a CLI command acting as `user`
fn cli_as(data_dir: &TempDir, user: &str) -> Command {
    let mut cmd = cli_cmd(data_dir);
    cmd.arg("--user").arg(user);
    cmd
}

fn init(data_dir: &TempDir, user: &str) {
    cli_cmd(data_dir).args(["init", user]).assert().success();
}

// ============================================================================
// Identity Tests
// ============================================================================

#[test]
fn test_init_sets_default_user() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["init", "alice@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized alice@example.com"))
        .stdout(predicate::str::contains("Fingerprint:"));

    assert!(data_dir.path().join("config.json").exists());

    cli_cmd(&data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("User: alice@example.com"));
}

#[test]
fn test_init_is_repeatable() {
    let data_dir = TempDir::new().unwrap();

    let first = cli_cmd(&data_dir).args(["init", "alice"]).output().unwrap();
    let second = cli_cmd(&data_dir).args(["init", "alice"]).output().unwrap();
    assert!(first.status.success() && second.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_commands_need_a_user() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user configured"));
}

#[test]
fn test_unknown_user_fails() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "alice");

    cli_as(&data_dir, "mallory")
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("converse init"));
}

// ============================================================================
// Conversation Tests
// ============================================================================

#[test]
fn test_post_and_show() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "alice");

    cli_cmd(&data_dir)
        .args(["post", "trip", "Shall we leave on Friday?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Posted msg1-alice.txt"));

    cli_cmd(&data_dir)
        .args(["show", "trip", "--verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shall we leave on Friday?"))
        .stdout(predicate::str::contains("msg 1"))
        .stdout(predicate::str::contains("✓ msg1-alice.txt"));
}

#[test]
fn test_list_conversations() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "alice");

    cli_cmd(&data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations found."));

    cli_cmd(&data_dir).args(["post", "trip", "hi"]).assert().success();
    cli_cmd(&data_dir).args(["post", "books", "hi"]).assert().success();

    cli_cmd(&data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversations (2):"))
        .stdout(predicate::str::contains("books"))
        .stdout(predicate::str::contains("trip"));
}

#[test]
fn test_invite_sync_and_reply() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "bob");
    init(&data_dir, "alice");

    cli_cmd(&data_dir).args(["post", "trip", "hi"]).assert().success();
    cli_cmd(&data_dir)
        .args(["invite", "trip", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invited bob"));
    cli_cmd(&data_dir)
        .args(["invite", "trip", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already has access"));

    cli_as(&data_dir, "bob")
        .args(["sync", "alice", "trip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 copied"));

    cli_as(&data_dir, "bob")
        .args(["post", "trip", "count me in"])
        .assert()
        .success()
        .stdout(predicate::str::contains("msg2-bob.txt"));

    // bob's reply was delivered to alice's replica too
    cli_cmd(&data_dir)
        .args(["show", "trip", "--verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("count me in"))
        .stdout(predicate::str::contains("✓ msg2-bob.txt"));
}

#[test]
fn test_sync_everything_from_peer() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "bob");
    init(&data_dir, "alice");

    cli_cmd(&data_dir).args(["post", "trip", "one"]).assert().success();
    cli_cmd(&data_dir).args(["post", "books", "two"]).assert().success();

    cli_as(&data_dir, "bob")
        .args(["sync", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 copied"));

    cli_as(&data_dir, "bob")
        .args(["sync", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 copied, 2 already present"));
}

#[test]
fn test_publish() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "alice");

    cli_cmd(&data_dir)
        .args(["publish", "empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no messages"));

    cli_cmd(&data_dir).args(["post", "trip", "**bold**"]).assert().success();
    cli_cmd(&data_dir)
        .args(["publish", "trip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice/conversations/trip/index.html"));
}

#[test]
fn test_attach() {
    let data_dir = TempDir::new().unwrap();
    init(&data_dir, "alice");

    let file = data_dir.path().join("notes.txt");
    std::fs::write(&file, "pack sunscreen").unwrap();

    cli_cmd(&data_dir)
        .args(["attach", "trip"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("alice/conversations/trip/notes.txt (14 bytes)"));
}
