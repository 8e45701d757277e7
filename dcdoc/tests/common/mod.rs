#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;

pub const GROUPS: &str = r#"<Groups>
  <Group Id="{d3a1e2a0-0000-4000-8000-000000000001}" Type="Device">
    <Name>Any Removable Storage</Name>
    <MatchType>MatchAny</MatchType>
    <DescriptorIdList>
      <PrimaryId>RemovableMediaDevices</PrimaryId>
    </DescriptorIdList>
  </Group>
  <Group Id="{d3a1e2a0-0000-4000-8000-000000000002}" Type="PrinterDevice">
    <Name>Network Printers</Name>
    <MatchType>MatchAny</MatchType>
    <DescriptorIdList>
      <PrinterConnectionId>Network</PrinterConnectionId>
    </DescriptorIdList>
  </Group>
</Groups>"#;

pub const READ_ONLY: &str = r#"<PolicyRules>
  <PolicyRule Id="{f0c0a0b0-0000-4000-8000-000000000001}">
    <Name>Read Only Removable Storage</Name>
    <IncludedIdList>
      <GroupId>{d3a1e2a0-0000-4000-8000-000000000001}</GroupId>
    </IncludedIdList>
    <ExcludedIdList></ExcludedIdList>
    <Entry Id="{e0000000-0000-4000-8000-000000000001}">
      <Type>Allow</Type>
      <AccessMask>1</AccessMask>
      <Options>0</Options>
    </Entry>
    <Entry Id="{e0000000-0000-4000-8000-000000000002}">
      <Type>Deny</Type>
      <AccessMask>6</AccessMask>
      <Options>0</Options>
    </Entry>
  </PolicyRule>
</PolicyRules>"#;

pub const PRINTER: &str = r#"<PolicyRules>
  <PolicyRule Id="{f0c0a0b0-0000-4000-8000-000000000002}">
    <Name>Block Network Printing</Name>
    <IncludedIdList>
      <GroupId>{d3a1e2a0-0000-4000-8000-000000000002}</GroupId>
    </IncludedIdList>
    <ExcludedIdList></ExcludedIdList>
    <Entry Id="{e0000000-0000-4000-8000-000000000003}">
      <Type>Deny</Type>
      <AccessMask>64</AccessMask>
      <Options>0</Options>
    </Entry>
  </PolicyRule>
</PolicyRules>"#;

/// `src/` with the shared groups and both rule files, plus an empty `out/`.
pub fn workspace(root: &Path) {
    let src = root.join("src");
    fs::create_dir_all(&src).expect("create src");
    fs::create_dir_all(root.join("out")).expect("create out");
    fs::write(src.join("groups.xml"), GROUPS).expect("write groups");
    fs::write(src.join("read_only.xml"), READ_ONLY).expect("write read_only");
    fs::write(src.join("printer.xml"), PRINTER).expect("write printer");
}

pub fn dcdoc(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dcdoc"));
    cmd.current_dir(root).env_remove("DC_QUERY").env_remove("TITLE");
    cmd
}
