use std::fs;

use predicates::prelude::*;
use tempfile::tempdir;

mod common;

use common::{dcdoc, workspace};

#[test]
fn input_writes_report_named_after_the_file() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-i", "src/read_only.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("read_only: 1 rules, 1 groups"));

    let report = fs::read_to_string(dir.path().join("out/read_only.md")).expect("report");
    assert!(report.starts_with("# read_only\n"));
    assert!(report.contains("### Read Only Removable Storage"));
    assert!(report.contains("| Primary Id | RemovableMediaDevices |"));
    assert!(report.contains("- **Intune UX**: supported"));
    assert!(report.contains("\"$type\": \"removableMedia\""));
    assert!(report.contains("| Default Enforcement |"));
    assert!(report.contains("(../src/read_only.xml)"));
    assert!(!report.contains("Block Network Printing"));
}

#[test]
fn query_writes_named_output() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-o", "printing.md", "--title", "Printing"])
        .args(["-q", "path.str.contains('printer')"])
        .assert()
        .success();

    let report = fs::read_to_string(dir.path().join("out/printing.md")).expect("report");
    assert!(report.starts_with("# Printing\n"));
    assert!(report.contains("### Block Network Printing"));
    assert!(report.contains("| Print |"));
    assert!(report.contains("> **Warning**: the macOS policy could not be generated"));
}

#[test]
fn mixed_rules_use_the_generic_permission_table() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-q", "*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Windows Generic"));

    let report = fs::read_to_string(dir.path().join("out/dcdoc.md")).expect("report");
    assert!(report.contains("The rules target more than one kind of device."));
    assert!(report.contains("| Disk Read |"));
    assert!(report.contains(" Print |"));
}

#[test]
fn scenarios_skip_missing_policies() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());
    fs::write(
        dir.path().join("scenarios.json"),
        r#"{
  "title": "Removable Storage Scenarios",
  "scenarios": [
    {"file": "src/read_only.xml", "title": "Read only", "description": "Only reading is allowed."},
    {"file": "src/does_not_exist.xml", "title": "Missing"}
  ]
}"#,
    )
    .expect("write scenarios");

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-s", "scenarios.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("does_not_exist.xml"))
        .stdout(predicate::str::contains("Read only: 1 rules"));

    let readme = fs::read_to_string(dir.path().join("out/readme.md")).expect("readme");
    assert_eq!(
        readme,
        "# Removable Storage Scenarios\n\n## [Read only](read_only.md)\n\nOnly reading is allowed.\n"
    );
    assert!(dir.path().join("out/read_only.md").is_file());
    assert!(!dir.path().join("out/does_not_exist.md").exists());
}

#[test]
fn custom_templates_from_the_templates_path() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());
    fs::create_dir(dir.path().join("tpl")).expect("mkdir");
    fs::write(
        dir.path().join("tpl/short.md.j2"),
        "{{ title }}|{{ result.rules | length }}|{{ description }}\n",
    )
    .expect("write");
    fs::write(dir.path().join("tpl/description.md.j2"), "{{ rule_count }} rule").expect("write");

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-i", "src/read_only.xml"])
        .args(["--templates-path", "tpl", "-t", "short.md.j2"])
        .assert()
        .success();

    let report = fs::read_to_string(dir.path().join("out/read_only.md")).expect("report");
    assert_eq!(report, "read_only|1|1 rule\n");
}

#[test]
fn unknown_template_fails_before_loading() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-i", "src/read_only.xml", "-t", "missing.md.j2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template missing.md.j2 not found"));
    assert!(!dir.path().join("out/read_only.md").exists());
}
