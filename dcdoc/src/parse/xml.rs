use std::path::Path;

use policy_xml::XmlNode;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::model::{
    Condition, ConditionKind, Enforcement, Entry, Format, Group, GroupProperty, GroupType,
    ParameterNode, Parameters, PolicyRule, Property, UNNAMED,
};
use crate::parse::ParsedFile;

/// Build model objects from a parsed policy XML document.
///
/// A single `<Group>` or `<PolicyRule>` root is an OMA-URI document;
/// `<Groups>`, `<PolicyGroups>` and `<PolicyRules>` roots are GPO documents.
pub fn parse_document(root: &XmlNode, path: &Path) -> Result<ParsedFile, ParseError> {
    let mut parsed = ParsedFile::default();
    match root.tag.as_str() {
        "Group" => {
            debug!(event = "Parse", path = %path.display(), "found <Group>");
            parsed.groups.push(group_from_xml(root, Format::OmaUri, Some(path))?);
        }
        "Groups" | "PolicyGroups" => {
            for node in root.find_all("Group") {
                debug!(event = "Parse", path = %path.display(), "found <{}><Group>", root.tag);
                keep(path, group_from_xml(node, Format::Gpo, Some(path)), &mut parsed.groups);
            }
        }
        "PolicyRule" => {
            debug!(event = "Parse", path = %path.display(), "found <PolicyRule>");
            parsed.rules.push(rule_from_xml(root, Format::OmaUri, Some(path), 1)?);
        }
        "PolicyRules" => {
            for (n, node) in root.find_all("PolicyRule").into_iter().enumerate() {
                debug!(event = "Parse", path = %path.display(), index = n + 1, "found <PolicyRules><PolicyRule>");
                keep(path, rule_from_xml(node, Format::Gpo, Some(path), n + 1), &mut parsed.rules);
            }
        }
        other => return Err(ParseError::UnexpectedRoot(other.to_string())),
    }
    Ok(parsed)
}

fn keep<T>(path: &Path, result: Result<T, ParseError>, out: &mut Vec<T>) {
    match result {
        Ok(item) => out.push(item),
        Err(err) => warn!(event = "Parse", path = %path.display(), error = %err, "skipping element"),
    }
}

fn mandatory_attr<'a>(node: &'a XmlNode, attribute: &'static str) -> Result<&'a str, ParseError> {
    node.attr(attribute)
        .map(str::trim)
        .ok_or_else(|| ParseError::MissingAttribute {
            element: node.to_string(),
            attribute,
        })
}

fn mandatory_text<'a>(node: &'a XmlNode, child: &'static str) -> Result<&'a str, ParseError> {
    node.child_text(child).ok_or_else(|| ParseError::MissingElement {
        element: node.to_string(),
        child,
    })
}

fn number(field: &'static str, value: &str) -> Result<u32, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

pub fn group_from_xml(node: &XmlNode, format: Format, path: Option<&Path>) -> Result<Group, ParseError> {
    let mut group = Group::new(mandatory_attr(node, "Id")?, format);
    group.group_type = GroupType::from_windows(node.attr("Type").unwrap_or_default());
    group.name = node.child_text("Name").unwrap_or(UNNAMED).to_string();
    if let Some(match_type) = node.child_text("MatchType").or_else(|| node.attr("MatchType")) {
        group.match_type = match_type.trim().to_string();
    }
    group.path = path.map(Path::to_path_buf);
    if let Some(list) = node.get_child("DescriptorIdList") {
        for descriptor in list.descendants() {
            if let Some(value) = descriptor.trimmed_text().filter(|text| !text.is_empty()) {
                group
                    .properties
                    .push(GroupProperty::Descriptor(Property::new(&descriptor.tag, value)));
            }
        }
    }
    Ok(group)
}

pub fn rule_from_xml(
    node: &XmlNode,
    format: Format,
    path: Option<&Path>,
    rule_index: usize,
) -> Result<PolicyRule, ParseError> {
    let mut rule = PolicyRule::new(mandatory_attr(node, "Id")?, format);
    rule.name = node.child_text("Name").unwrap_or(UNNAMED).to_string();
    rule.path = path.map(Path::to_path_buf);
    rule.rule_index = rule_index;
    rule.included_groups = group_ids(node, "IncludedIdList");
    rule.excluded_groups = group_ids(node, "ExcludedIdList");
    for entry in node.get_children("Entry") {
        let mut entry = entry_from_xml(entry)?;
        entry.format = format;
        rule.entries.push(entry);
    }
    Ok(rule)
}

fn group_ids(node: &XmlNode, list: &str) -> Vec<String> {
    node.get_child(list)
        .map(|list| {
            list.find_all("GroupId")
                .into_iter()
                .filter_map(XmlNode::trimmed_text)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn entry_from_xml(node: &XmlNode) -> Result<Entry, ParseError> {
    let id = mandatory_attr(node, "Id")?;
    let enforcement = Enforcement::from_windows(mandatory_text(node, "Type")?)?;
    let access_mask = number("AccessMask", mandatory_text(node, "AccessMask")?)?;
    let options = match node.child_text("Options") {
        Some(options) => number("Options", options)?,
        None => 0,
    };
    let mut entry = Entry::windows(id, enforcement, access_mask, options);
    entry.sid = node.child_text("Sid").map(str::to_string);
    entry.computer_sid = node.child_text("ComputerSid").map(str::to_string);
    entry.parameters = node.get_child("Parameters").map(parameters_from_xml).transpose()?;
    Ok(entry)
}

fn parameters_from_xml(node: &XmlNode) -> Result<Parameters, ParseError> {
    let mut parameters = Parameters::new(mandatory_attr(node, "MatchType")?);
    for child in &node.children {
        if child.tag == "Parameters" {
            parameters
                .conditions
                .push(ParameterNode::Parameters(parameters_from_xml(child)?));
            continue;
        }
        let kind = ConditionKind::from_tag(&child.tag)
            .ok_or_else(|| ParseError::UnknownCondition(child.tag.clone()))?;
        parameters.conditions.push(ParameterNode::Condition(Condition {
            kind,
            match_type: mandatory_attr(child, "MatchType")?.to_string(),
            groups: child
                .find_all("GroupId")
                .into_iter()
                .filter_map(XmlNode::trimmed_text)
                .map(str::to_string)
                .collect(),
        }));
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use policy_xml::parse_str;

    use super::parse_document;
    use crate::error::ParseError;
    use crate::model::{Enforcement, EntryType, Format, GroupType};

    const GROUPS: &str = r#"<Groups>
  <Group Id="{a}" Type="Device">
    <MatchType>MatchAny</MatchType>
    <DescriptorIdList>
      <PrimaryId>RemovableMediaDevices</PrimaryId>
      <VID_PID>0951_1666</VID_PID>
    </DescriptorIdList>
  </Group>
  <Group Type="Device"><Name>No id</Name></Group>
  <Group Id="{b}" Type="PrinterDevice"><Name>Printers</Name></Group>
</Groups>"#;

    const RULES: &str = r#"<PolicyRules>
  <PolicyRule Id="{r1}">
    <Name>Audit</Name>
    <IncludedIdList><GroupId>{a}</GroupId></IncludedIdList>
    <ExcludedIdList><GroupId>{b}</GroupId></ExcludedIdList>
    <Entry Id="{e1}">
      <Type>AuditDenied</Type>
      <AccessMask>5</AccessMask>
      <Options>3</Options>
      <Sid>S-1-1-0</Sid>
      <Parameters MatchType="MatchAll">
        <Network MatchType="MatchAny"><GroupId>{n}</GroupId></Network>
      </Parameters>
    </Entry>
  </PolicyRule>
  <PolicyRule Id="{r2}">
    <Entry Id="{e2}"><Type>Deny</Type><AccessMask>64</AccessMask></Entry>
  </PolicyRule>
</PolicyRules>"#;

    #[test]
    fn gpo_groups_skip_broken_siblings() {
        let root = parse_str(GROUPS).expect("xml");
        let parsed = parse_document(&root, Path::new("devices.xml")).expect("parsed");
        assert_eq!(parsed.groups.len(), 2);
        let first = &parsed.groups[0];
        assert_eq!(first.format, Format::Gpo);
        assert!(first.is_unnamed());
        assert_eq!(first.properties.len(), 2);
        assert_eq!(parsed.groups[1].group_type, GroupType::PrinterDevice);
        assert_eq!(parsed.groups[1].match_type, "MatchAny");
    }

    #[test]
    fn gpo_rules_carry_index_and_entries() {
        let root = parse_str(RULES).expect("xml");
        let parsed = parse_document(&root, Path::new("rules.xml")).expect("parsed");
        let first = &parsed.rules[0];
        assert_eq!(first.rule_index, 1);
        assert_eq!(first.included_groups, vec!["{a}"]);
        assert_eq!(first.excluded_groups, vec!["{b}"]);
        let entry = &first.entries[0];
        assert_eq!(entry.enforcement, Enforcement::AuditDenied);
        assert_eq!(entry.access_mask, 5);
        assert_eq!(entry.sid.as_deref(), Some("S-1-1-0"));
        assert_eq!(entry.group_ids(), vec!["{n}"]);
        let second = &parsed.rules[1];
        assert_eq!(second.name, "?");
        assert_eq!(second.rule_index, 2);
        assert_eq!(second.entries[0].options, 0);
        assert_eq!(second.entry_type(), EntryType::WindowsPrinter);
    }

    #[test]
    fn single_group_root_is_oma_uri() {
        let root = parse_str(r#"<Group Id="{a}" MatchType="MatchAll"><Name>One</Name></Group>"#)
            .expect("xml");
        let parsed = parse_document(&root, Path::new("one.xml")).expect("parsed");
        assert_eq!(parsed.groups[0].format, Format::OmaUri);
        assert_eq!(parsed.groups[0].match_type, "MatchAll");
    }

    #[test]
    fn unknown_condition_rejects_the_rule() {
        let root = parse_str(
            r#"<PolicyRule Id="{r}"><Entry Id="{e}"><Type>Allow</Type><AccessMask>1</AccessMask>
            <Parameters MatchType="MatchAll"><Printer MatchType="MatchAny"/></Parameters></Entry></PolicyRule>"#,
        )
        .expect("xml");
        let err = parse_document(&root, Path::new("r.xml")).expect_err("unknown condition");
        assert!(matches!(err, ParseError::UnknownCondition(tag) if tag == "Printer"));
    }

    #[test]
    fn bad_numbers_and_roots_are_errors() {
        let root = parse_str(
            r#"<PolicyRule Id="{r}"><Entry Id="{e}"><Type>Allow</Type><AccessMask>x</AccessMask></Entry></PolicyRule>"#,
        )
        .expect("xml");
        assert!(matches!(
            parse_document(&root, Path::new("r.xml")),
            Err(ParseError::InvalidNumber { field: "AccessMask", .. })
        ));
        let root = parse_str("<Settings/>").expect("xml");
        assert!(matches!(
            parse_document(&root, Path::new("s.xml")),
            Err(ParseError::UnexpectedRoot(_))
        ));
    }
}
