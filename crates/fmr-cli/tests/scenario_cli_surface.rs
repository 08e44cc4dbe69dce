use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn scenario_help_lists_both_entry_points() {
    Command::cargo_bin("fmr")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"))
        .stdout(predicate::str::contains("janitor"))
        .stdout(predicate::str::contains("db"));
}

#[test]
fn scenario_unknown_subcommand_exits_non_zero() {
    Command::cargo_bin("fmr")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn scenario_db_requires_a_subcommand() {
    Command::cargo_bin("fmr")
        .unwrap()
        .arg("db")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn scenario_unparsable_environment_is_fatal() {
    Command::cargo_bin("fmr")
        .unwrap()
        .env("FMR_MIN_API_POINTS", "not-a-number")
        .arg("janitor")
        .assert()
        .failure()
        .stderr(predicate::str::contains("FMR_MIN_API_POINTS"));
}
