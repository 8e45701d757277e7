//! Flat CSV extracts of the whole inventory.
//!
//! Rows are collected into append-only tables and only turned into files by
//! [`CsvExport::write`].

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::info;

use crate::clause_table::generate_table_for_clauses;
use crate::inventory::Inventory;
use crate::model::{EntryType, Group, GroupType, PolicyRule};
use crate::naming::clean_up_name;

const OPERATOR_COLUMNS: [&str; 3] = ["op", "op2", "op3"];

/// Append-only rows under a growing header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<IndexMap<String, String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| header.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; columns not in the header yet are added at the end.
    pub fn push<K: Into<String>, V: Into<String>>(&mut self, row: impl IntoIterator<Item = (K, V)>) {
        let mut cells = IndexMap::new();
        for (column, value) in row {
            let column = column.into();
            if !self.headers.contains(&column) {
                self.headers.push(column.clone());
            }
            let value = value.into();
            cells
                .entry(column)
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert_with(|| value.clone());
        }
        self.rows.push(cells);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(
                self.headers
                    .iter()
                    .map(|header| row.get(header).map(String::as_str).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Every CSV table produced from an inventory.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub groups: Table,
    pub rules: Table,
    pub entries: Table,
    pub directory_object_conditions: Table,
    pub parameter_conditions: Table,
    pub rule_properties: Table,
    /// Keyed by group type label.
    pub group_properties: IndexMap<String, Table>,
    /// Keyed by entry type label.
    pub entry_access: IndexMap<String, Table>,
}

impl Default for CsvExport {
    fn default() -> Self {
        let known_group_types = [
            GroupType::Device,
            GroupType::PrinterDevice,
            GroupType::PrintJob,
            GroupType::File,
            GroupType::Network,
            GroupType::VPNConnection,
            GroupType::MacDevice,
        ];
        let group_properties = known_group_types
            .iter()
            .map(|group_type| (group_type.label().to_string(), group_property_table(group_type)))
            .collect();
        let entry_access = EntryType::ALL
            .iter()
            .map(|entry_type| (entry_type.label().to_string(), entry_access_table(*entry_type)))
            .collect();

        Self {
            groups: Table::new(&["type", "path", "format", "name", "id", "match_type", "type_label"]),
            rules: Table::new(&[
                "path",
                "format",
                "name",
                "entry_type",
                "id",
                "included_groups",
                "excluded_groups",
                "rule_index",
            ]),
            entries: Table::new(&["entryId", "ruleId", "entry_type", "enforcement", "notifications"]),
            directory_object_conditions: Table::new(&["entryId", "ruleId", "objectType", "objectValue"]),
            parameter_conditions: Table::new(&[
                "entryId",
                "ruleId",
                "conditionType",
                "conditionProperty",
                "conditionValue",
            ]),
            rule_properties: Table::new(&["ruleId", "propertyType", "propertyValue", "type"]),
            group_properties,
            entry_access,
        }
    }
}

fn group_property_table(group_type: &GroupType) -> Table {
    let mut headers = vec!["groupId"];
    if *group_type == GroupType::MacDevice {
        headers.extend(OPERATOR_COLUMNS);
    }
    headers.extend(group_type.property_labels().iter().map(|(_, label)| *label));
    Table::new(&headers)
}

fn entry_access_table(entry_type: EntryType) -> Table {
    let mut headers = vec!["entryId", "ruleId", "conditionMatchType"];
    headers.extend(entry_type.access_types().iter().map(|access| access.label));
    Table::new(&headers)
}

fn path_cell(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string()).unwrap_or_default()
}

impl CsvExport {
    pub fn from_inventory(inventory: &Inventory) -> Self {
        let mut export = CsvExport::default();
        for group in inventory.groups() {
            export.add_group(group);
        }
        for rule in inventory.rules() {
            export.add_rule(rule, inventory);
        }
        export
    }

    fn add_group(&mut self, group: &Group) {
        self.groups.push([
            ("type", group.group_type.as_str().to_string()),
            ("path", path_cell(group.path.as_deref())),
            ("format", group.format.to_string()),
            ("name", group.name.clone()),
            ("id", group.id.clone()),
            ("match_type", group.match_type.clone()),
            ("type_label", group.group_type.label().to_string()),
        ]);

        let label = group.group_type.label().to_string();
        let table = self
            .group_properties
            .entry(label)
            .or_insert_with(|| group_property_table(&group.group_type));

        if group.clauses().next().is_some() || group.group_type == GroupType::MacDevice {
            for row in generate_table_for_clauses(&[group.root_clause()], 1) {
                let mut cells = vec![("groupId".to_string(), group.id.clone())];
                for (column, op) in OPERATOR_COLUMNS.iter().zip(&row.cells) {
                    cells.push((column.to_string(), op.clone()));
                }
                cells.push((
                    group.group_type.property_label(&row.property.name).to_string(),
                    row.property.value.clone(),
                ));
                table.push(cells);
            }
        } else {
            let mut cells = vec![("groupId".to_string(), group.id.clone())];
            for property in group.descriptors() {
                cells.push((
                    group.group_type.property_label(&property.name).to_string(),
                    property.value.clone(),
                ));
            }
            table.push(cells);
        }
    }

    fn add_rule(&mut self, rule: &PolicyRule, inventory: &Inventory) {
        self.rules.push([
            ("path", path_cell(rule.path.as_deref())),
            ("format", rule.format.to_string()),
            ("name", rule.name.clone()),
            ("entry_type", rule.entry_type().label().to_string()),
            ("id", rule.id.clone()),
            ("included_groups", rule.included_groups.join(";")),
            ("excluded_groups", rule.excluded_groups.join(";")),
            ("rule_index", rule.rule_index.to_string()),
        ]);

        for (kind, ids) in [("included", &rule.included_groups), ("excluded", &rule.excluded_groups)] {
            for id in ids {
                let Some(group) = inventory.groups_with_id(id).next() else {
                    continue;
                };
                let properties = group
                    .descriptors()
                    .chain(group.clauses().flat_map(|clause| clause.all_properties()));
                for property in properties {
                    self.rule_properties.push([
                        ("ruleId", rule.id.clone()),
                        ("propertyType", property.name.clone()),
                        ("propertyValue", property.value.clone()),
                        ("type", kind.to_string()),
                    ]);
                }
            }
        }

        for entry in &rule.entries {
            self.entries.push([
                ("entryId", entry.id.clone()),
                ("ruleId", rule.id.clone()),
                ("entry_type", entry.entry_type.label().to_string()),
                ("enforcement", entry.enforcement.label().to_string()),
                ("notifications", entry.notifications().join(", ")),
            ]);

            let mut access = vec![
                ("entryId".to_string(), entry.id.clone()),
                ("ruleId".to_string(), rule.id.clone()),
                (
                    "conditionMatchType".to_string(),
                    entry.condition_match_type().unwrap_or_default().to_string(),
                ),
            ];
            for (label, granted) in entry.permissions(entry.entry_type) {
                access.push((label.to_string(), granted.to_string()));
            }
            self.entry_access
                .entry(entry.entry_type.label().to_string())
                .or_insert_with(|| entry_access_table(entry.entry_type))
                .push(access);

            if let Some(sid) = &entry.sid {
                self.directory_object_conditions.push([
                    ("entryId", entry.id.clone()),
                    ("ruleId", rule.id.clone()),
                    ("objectType", "User".to_string()),
                    ("objectValue", sid.clone()),
                ]);
            }
            if let Some(sid) = &entry.computer_sid {
                self.directory_object_conditions.push([
                    ("entryId", entry.id.clone()),
                    ("ruleId", rule.id.clone()),
                    ("objectType", "Computer".to_string()),
                    ("objectValue", sid.clone()),
                ]);
            }
            if let Some(parameters) = &entry.parameters {
                for (_, condition) in parameters.flatten() {
                    for group in &condition.groups {
                        self.parameter_conditions.push([
                            ("entryId", entry.id.clone()),
                            ("ruleId", rule.id.clone()),
                            ("conditionType", condition.kind.tag().to_string()),
                            ("conditionProperty", "Group Id".to_string()),
                            ("conditionValue", group.clone()),
                        ]);
                    }
                }
            }
        }
    }

    /// Write every table into `dest`; returns the files written.
    pub fn write(&self, dest: &Path) -> Result<Vec<PathBuf>, csv::Error> {
        let mut files: Vec<(String, &Table)> = vec![
            ("dc_groups.csv".to_string(), &self.groups),
            ("dc_rules.csv".to_string(), &self.rules),
            ("dc_entries.csv".to_string(), &self.entries),
            (
                "dc_directory_object_conditions.csv".to_string(),
                &self.directory_object_conditions,
            ),
            ("dc_parameter_conditions.csv".to_string(), &self.parameter_conditions),
            ("dc_rule_properties.csv".to_string(), &self.rule_properties),
        ];
        for (label, table) in &self.group_properties {
            files.push((format!("dc_{}.csv", clean_up_name(label, "_")), table));
        }
        for (label, table) in &self.entry_access {
            files.push((format!("dc_{}_access.csv", clean_up_name(label, "_")), table));
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, table) in files {
            let path = dest.join(name);
            table.write(&path)?;
            info!(event = "Csv", path = %path.display(), rows = table.len(), "generated csv");
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{CsvExport, Table};
    use crate::inventory::{Inventory, InventoryOptions};

    const GROUPS: &str = r#"<Groups>
  <Group Id="{a}"><Name>USB</Name><DescriptorIdList>
    <PrimaryId>RemovableMediaDevices</PrimaryId><VID_PID>0951_1666</VID_PID><VID_PID>0781_*</VID_PID>
  </DescriptorIdList></Group>
</Groups>"#;

    const RULES: &str = r#"<PolicyRules>
  <PolicyRule Id="{r}"><Name>Block</Name>
    <IncludedIdList><GroupId>{a}</GroupId></IncludedIdList>
    <Entry Id="{e}"><Type>Deny</Type><AccessMask>5</AccessMask><Options>4</Options>
      <Sid>S-1-5-21-1</Sid>
      <Parameters MatchType="MatchAny"><Network MatchType="MatchAny"><GroupId>{n}</GroupId></Network></Parameters>
    </Entry>
  </PolicyRule>
</PolicyRules>"#;

    fn export() -> (tempfile::TempDir, CsvExport) {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("groups.xml"), GROUPS).expect("write");
        fs::write(dir.path().join("rules.xml"), RULES).expect("write");
        let mut inventory = Inventory::new(InventoryOptions::default());
        inventory.load(&[dir.path().to_path_buf()]);
        (dir, CsvExport::from_inventory(&inventory))
    }

    #[test]
    fn table_grows_headers_and_joins_repeats() {
        let mut table = Table::new(&["id"]);
        table.push([("id", "1"), ("x", "a"), ("x", "b")]);
        assert_eq!(table.headers(), ["id".to_string(), "x".to_string()]);
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("t.csv");
        table.write(&path).expect("write");
        assert_eq!(fs::read_to_string(path).expect("read"), "id,x\n1,\"a, b\"\n");
    }

    #[test]
    fn collects_rows_for_every_table() {
        let (_dir, export) = export();
        assert_eq!(export.groups.len(), 1);
        assert_eq!(export.rules.len(), 1);
        assert_eq!(export.entries.len(), 1);
        assert_eq!(export.directory_object_conditions.len(), 1);
        assert_eq!(export.parameter_conditions.len(), 1);
        assert_eq!(export.rule_properties.len(), 3);
        assert_eq!(export.group_properties["Windows Device"].len(), 1);
        assert_eq!(export.entry_access["Windows Device"].len(), 1);
        assert!(export.group_properties["Mac Device"].headers().contains(&"op2".to_string()));
    }

    #[test]
    fn writes_the_full_file_set() {
        let (dir, export) = export();
        let out = dir.path().join("out");
        fs::create_dir(&out).expect("mkdir");
        let written = export.write(&out).expect("write");
        for name in [
            "dc_groups.csv",
            "dc_rules.csv",
            "dc_entries.csv",
            "dc_directory_object_conditions.csv",
            "dc_parameter_conditions.csv",
            "dc_rule_properties.csv",
            "dc_windows_device.csv",
            "dc_mac_device.csv",
            "dc_windows_device_access.csv",
            "dc_mac_removable_media_access.csv",
        ] {
            assert!(out.join(name).is_file(), "missing {name}");
        }
        assert_eq!(written.len(), 6 + 7 + 8);

        let access = fs::read_to_string(out.join("dc_windows_device_access.csv")).expect("read");
        let mut lines = access.lines();
        assert_eq!(
            lines.next(),
            Some("entryId,ruleId,conditionMatchType,Disk Read,Disk Write,Disk Execute,File Read,File Write,File Execute")
        );
        assert_eq!(lines.next(), Some("{e},{r},MatchAny,true,false,true,false,false,false"));

        let device = fs::read_to_string(out.join("dc_windows_device.csv")).expect("read");
        assert!(device.contains("{a},RemovableMediaDevices,,,,,,\"0951_1666, 0781_*\","));
    }
}
