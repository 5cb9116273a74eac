//! CLI argument handling tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn wayfinder() -> Command {
    Command::cargo_bin("wayfinder").expect("binary built")
}

#[test]
fn help_lists_the_lifecycle_subcommands() {
    wayfinder()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("advance"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn init_requires_tenant_identifiers() {
    wayfinder()
        .args(["init", "--flow-type", "discovery"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--account"));
}

#[test]
fn init_rejects_unknown_flow_types() {
    wayfinder()
        .args([
            "init",
            "--flow-type",
            "teleportation",
            "--account",
            "acct-1",
            "--engagement",
            "eng-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("teleportation"));
}

#[test]
fn unreachable_server_is_a_clean_error() {
    wayfinder()
        .args([
            "status",
            "flow-123",
            "--server",
            "http://127.0.0.1:1",
            "--account",
            "acct-1",
            "--engagement",
            "eng-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
