use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_check_command() {
    let mut cmd = Command::cargo_bin("mergeready").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("merge-readiness"));
}

#[test]
fn test_check_help_documents_flags() {
    let mut cmd = Command::cargo_bin("mergeready").unwrap();
    cmd.args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--run-log"))
        .stdout(predicate::str::contains("--skip-integration"))
        .stdout(predicate::str::contains("--post-comments"));
}

#[test]
fn test_no_subcommand_prints_usage_hint() {
    let mut cmd = Command::cargo_bin("mergeready").unwrap();
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("mergeready check"));
}

#[test]
fn test_check_without_items_or_run_log_fails() {
    let mut cmd = Command::cargo_bin("mergeready").unwrap();
    cmd.arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No work items"));
}
