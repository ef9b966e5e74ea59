//! Tests for the `notifan` binary.

use assert_cmd::Command;
use notifan::config::legacy_variable_names;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// The binary with every variable that could leak in from the test
/// environment removed.
fn notifan() -> Command {
    let mut cmd = Command::cargo_bin("notifan").unwrap();
    for (key, _) in std::env::vars() {
        if key.starts_with("NOTIFAN_") || key.starts_with("GITHUB_") {
            cmd.env_remove(key);
        }
    }
    for name in legacy_variable_names() {
        cmd.env_remove(name);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn event_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", json).unwrap();
    file
}

#[test]
fn test_list_channels() {
    notifan()
        .arg("--list-channels")
        .assert()
        .success()
        .stdout(predicate::str::contains("Console").and(predicate::str::contains("not configured")));
}

#[test]
fn test_direct_message_goes_to_console() {
    notifan()
        .args(["--title", "Deploy", "--content", "all green"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deploy\n\nall green"));
}

#[test]
fn test_json_output_is_the_only_thing_on_stdout() {
    let assert = notifan()
        .args(["--title", "Deploy", "--content", "all green", "--json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Deploy\n\nall green"));

    let summary: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["successful"], serde_json::json!(["Console"]));
}

#[test]
fn test_legacy_variables_from_the_caller_are_ignored() {
    // Inherited, this would disable the console and leave no channel at all.
    std::env::set_var("CONSOLE", "false");
    let assert = notifan()
        .args(["--title", "t", "--content", "c", "--json"])
        .assert();
    std::env::remove_var("CONSOLE");

    let summary: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["successful"], serde_json::json!(["Console"]));
}

#[test]
fn test_event_file_is_processed() {
    let file = event_file(r#"{"client_payload": {"title": "From event", "content": "hello"}}"#);
    notifan()
        .env("GITHUB_EVENT_PATH", file.path())
        .env("GITHUB_EVENT_NAME", "repository_dispatch")
        .assert()
        .success()
        .stdout(predicate::str::contains("From event\n\nhello"));
}

#[test]
fn test_unsupported_event_name_fails() {
    let file = event_file(r#"{"client_payload": {"title": "t", "content": "c"}}"#);
    notifan()
        .env("GITHUB_EVENT_PATH", file.path())
        .env("GITHUB_EVENT_NAME", "push")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported event type"));
}

#[test]
fn test_invalid_event_payload_fails() {
    let file = event_file(r#"{"client_payload": {"title": "t"}}"#);
    notifan()
        .arg("--event-path")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("content"));
}

#[test]
fn test_nothing_to_send_fails() {
    notifan().assert().failure();
}

#[test]
fn test_empty_content_is_not_a_failure() {
    notifan()
        .args(["--title", "t", "--content", ""])
        .assert()
        .success();
}

#[test]
fn test_exit_status_is_failure_when_every_channel_fails() {
    // Nothing listens on port 1, so the only channel fails to connect.
    notifan()
        .env("NOTIFAN_CHANNELS__CONSOLE__ENABLED", "false")
        .env("NOTIFAN_CHANNELS__IGOT__KEY", "key")
        .env("NOTIFAN_CHANNELS__IGOT__URL", "http://127.0.0.1:1")
        .args(["--title", "t", "--content", "c", "--retry-attempts", "1", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"failed\"").and(predicate::str::contains("iGot")));
}
