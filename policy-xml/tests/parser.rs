use std::fs;

use policy_xml::{parse_file, parse_str};
use pretty_assertions::assert_eq;

#[test]
fn parses_attributes_text_and_nested_descriptors() {
    let node = parse_str(
        r#"<Groups>
            <Group Id="{9b28fae8-72f7-4267-a1a5-685f747a7146}" Type="Device">
                <Name>Any Removable Storage</Name>
                <MatchType>MatchAny</MatchType>
                <DescriptorIdList>
                    <PrimaryId>RemovableMediaDevices</PrimaryId>
                    <PrimaryId>CdRomDevices</PrimaryId>
                </DescriptorIdList>
            </Group>
        </Groups>"#,
    )
    .expect("parse should succeed");

    assert_eq!(node.tag, "Groups");
    let group = node.get_child("Group").expect("group should exist");
    assert_eq!(group.attr("Type"), Some("Device"));
    assert_eq!(group.child_text("MatchType"), Some("MatchAny"));

    let list = group.get_child("DescriptorIdList").expect("descriptor list");
    let values: Vec<&str> = list
        .get_children("PrimaryId")
        .iter()
        .filter_map(|n| n.trimmed_text())
        .collect();
    assert_eq!(values, vec!["RemovableMediaDevices", "CdRomDevices"]);
}

#[test]
fn decodes_entities_in_text_and_attributes() {
    let node = parse_str(r#"<PolicyRule Id="a&amp;b"><Name>Read &amp; Write</Name></PolicyRule>"#)
        .expect("parse should succeed");
    assert_eq!(node.attr("Id"), Some("a&b"));
    assert_eq!(node.child_text("Name"), Some("Read & Write"));
}

#[test]
fn parse_file_reads_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("rule.xml");
    fs::write(&path, "<PolicyRule Id=\"r\"><Name>n</Name></PolicyRule>").expect("write");

    let node = parse_file(&path).expect("parse_file should succeed");
    assert_eq!(node.tag, "PolicyRule");
}

#[test]
fn parse_file_reports_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let err = parse_file(&dir.path().join("missing.xml")).expect_err("missing file");
    assert!(err.to_string().contains("failed to read XML file"));
}
