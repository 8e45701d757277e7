use std::fs;

use pretty_assertions::assert_eq;
use predicates::prelude::*;
use tempfile::tempdir;

mod common;

use common::{dcdoc, workspace};

#[test]
fn csv_format_writes_the_table_set() {
    let dir = tempdir().expect("tempdir");
    workspace(dir.path());

    dcdoc(dir.path())
        .args(["-p", "src", "-d", "out", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("csv files"));

    let out = dir.path().join("out");
    let groups = fs::read_to_string(out.join("dc_groups.csv")).expect("groups");
    let mut lines = groups.lines();
    assert_eq!(lines.next(), Some("type,path,format,name,id,match_type,type_label"));
    assert_eq!(lines.count(), 2);

    let entries = fs::read_to_string(out.join("dc_entries.csv")).expect("entries");
    assert_eq!(entries.lines().count(), 4);
    assert!(entries.contains("Deny,Nothing"));

    let printer = fs::read_to_string(out.join("dc_windows_printer_access.csv")).expect("printer");
    assert!(printer.starts_with("entryId,ruleId,conditionMatchType,Print\n"));
    assert!(printer.contains(",true\n"));

    for name in [
        "dc_rules.csv",
        "dc_directory_object_conditions.csv",
        "dc_parameter_conditions.csv",
        "dc_rule_properties.csv",
        "dc_windows_device.csv",
        "dc_windows_printer_device.csv",
        "dc_mac_device.csv",
    ] {
        assert!(out.join(name).is_file(), "missing {name}");
    }
}
