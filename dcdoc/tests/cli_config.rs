use std::fs;

use predicates::prelude::*;
use tempfile::tempdir;

mod common;

use common::{dcdoc, workspace};

#[test]
fn missing_dest_is_rejected() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "nowhere", "-q", "*"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}

#[test]
fn unknown_generate_format_is_rejected() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-g", "pdf:out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid format 'pdf'"));
}

#[test]
fn input_and_query_are_exclusive() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-i", "src/read_only.xml", "-q", "*"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_input_file_is_rejected() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-i", "src/nothing.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a file"));
}

#[test]
fn broken_config_file_is_rejected() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());
    fs::write(dir.path().join("dcdoc.toml"), "paths = 3\n").expect("write");

    dcdoc(dir.path())
        .args(["--config", "dcdoc.toml", "-f", "csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[test]
fn config_file_supplies_paths_and_dest() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());
    fs::write(dir.path().join("dcdoc.toml"), "paths = [\"src\"]\ndest = \"out\"\n").expect("write");

    dcdoc(dir.path())
        .args(["--config", "dcdoc.toml", "-f", "csv"])
        .assert()
        .success();

    assert!(dir.path().join("out/dc_rules.csv").is_file());
}
