//! Integration tests for the `streamsift` CLI.
//!
//! Only offline commands are exercised here; resolution against live hosts
//! is covered by the mock-server pipeline tests.

#![allow(deprecated)] // cargo_bin deprecation — replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Helper: get a Command for the `streamsift` binary.
fn streamsift() -> Command {
    Command::cargo_bin("streamsift").expect("binary 'streamsift' should be built")
}

#[test]
fn help_lists_subcommands() {
    streamsift()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn version_prints() {
    streamsift()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("streamsift"));
}

#[test]
fn scan_finds_iframe_candidates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"<html><body><iframe src="https://embedhost.example/e/abc123"></iframe></body></html>"#
    )
    .unwrap();

    streamsift()
        .arg("scan")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "https://embedhost.example/e/abc123",
        ));
}

#[test]
fn scan_reports_empty_input() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "<html><body><p>nothing here</p></body></html>").unwrap();

    streamsift()
        .arg("scan")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No candidates found"));
}

#[test]
fn resolve_rejects_bare_id_locator() {
    streamsift()
        .args(["resolve", "abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locator"));
}

#[test]
fn scan_missing_file_fails() {
    streamsift()
        .args(["scan", "/nonexistent/input.html"])
        .assert()
        .failure();
}
