use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::model::{
    Clause, Enforcement, Entry, EntryType, Format, Group, GroupProperty, GroupType, PolicyRule,
    Settings,
};
use crate::parse::ParsedFile;

/// Build model objects from a macOS device control policy.
pub fn parse_document(value: &Value, path: &Path) -> Result<ParsedFile, ParseError> {
    let object = value
        .as_object()
        .ok_or_else(|| ParseError::Shape("policy is not a JSON object".to_string()))?;
    let mut parsed = ParsedFile::default();

    for group in array(object, "groups") {
        match group_from_json(group, Some(path)) {
            Ok(group) => {
                debug!(event = "Parse", path = %path.display(), id = %group.id, "found mac group");
                parsed.groups.push(group);
            }
            Err(err) => warn!(event = "Parse", path = %path.display(), error = %err, "skipping group"),
        }
    }

    for (n, rule) in array(object, "rules").iter().enumerate() {
        match rule_from_json(rule, Some(path), n + 1) {
            Ok(rule) => {
                debug!(event = "Parse", path = %path.display(), id = %rule.id, "found mac rule");
                parsed.rules.push(rule);
            }
            Err(err) => warn!(event = "Parse", path = %path.display(), error = %err, "skipping rule"),
        }
    }

    if let Some(settings) = object.get("settings") {
        match Settings::from_mac_json(settings) {
            Ok(settings) => parsed.settings = Some(settings),
            Err(err) => warn!(event = "Parse", path = %path.display(), error = %err, "ignoring settings"),
        }
    }
    Ok(parsed)
}

fn array<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn strings(object: &Map<String, Value>, key: &str) -> Vec<String> {
    array(object, key)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

fn object_of<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| ParseError::Shape(format!("{what} is not an object: {value}")))
}

fn mandatory_str<'a>(object: &'a Map<String, Value>, key: &str, what: &str) -> Result<&'a str, ParseError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::Shape(format!("{what} without {key}")))
}

pub fn group_from_json(value: &Value, path: Option<&Path>) -> Result<Group, ParseError> {
    let object = object_of(value, "group")?;
    let mut group = Group::new(mandatory_str(object, "id", "group")?, Format::Mac);
    if let Some(name) = object.get("name").and_then(Value::as_str) {
        group.name = name.to_string();
    }
    group.group_type = GroupType::from_mac(object.get("$type").and_then(Value::as_str).unwrap_or_default());
    group.path = path.map(Path::to_path_buf);

    if let Some(query) = object.get("query") {
        let root = Clause::from_mac_json(query)?;
        group.match_type = root.clause_type;
        group.properties = root
            .properties
            .into_iter()
            .map(GroupProperty::Descriptor)
            .chain(root.sub_clauses.into_iter().map(GroupProperty::Clause))
            .collect();
    }
    Ok(group)
}

pub fn rule_from_json(value: &Value, path: Option<&Path>, rule_index: usize) -> Result<PolicyRule, ParseError> {
    let object = object_of(value, "rule")?;
    let mut rule = PolicyRule::new(mandatory_str(object, "id", "rule")?, Format::Mac);
    if let Some(name) = object.get("name").and_then(Value::as_str) {
        rule.name = name.to_string();
    }
    rule.path = path.map(Path::to_path_buf);
    rule.rule_index = rule_index;
    rule.included_groups = strings(object, "includeGroups");
    rule.excluded_groups = strings(object, "excludeGroups");
    for (n, entry) in array(object, "entries").iter().enumerate() {
        let default_id = format!("{}-{}", rule.id, n + 1);
        rule.entries.push(entry_from_json(entry, default_id)?);
    }
    Ok(rule)
}

fn entry_from_json(value: &Value, default_id: String) -> Result<Entry, ParseError> {
    let object = object_of(value, "entry")?;
    let raw_type = mandatory_str(object, "$type", "entry")?;
    let entry_type =
        EntryType::from_mac_type(raw_type).ok_or_else(|| ParseError::UnknownEntryType(raw_type.to_string()))?;
    let enforcement = object
        .get("enforcement")
        .ok_or_else(|| ParseError::Shape("entry without enforcement".to_string()))?;
    let enforcement_object = object_of(enforcement, "enforcement")?;
    let kind = Enforcement::from_mac(mandatory_str(enforcement_object, "$type", "enforcement")?)?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(default_id);
    Ok(Entry::mac(
        id,
        entry_type,
        kind,
        strings(object, "access"),
        strings(enforcement_object, "options"),
    ))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::parse_document;
    use crate::model::{DefaultEnforcement, Enforcement, EntryType, Format, GroupType};

    fn policy() -> serde_json::Value {
        json!({
            "groups": [
                {
                    "$type": "device",
                    "id": "3f082cd3-f701-4c21-9a6a-ed115c28cf9f",
                    "name": "All removable media",
                    "query": {
                        "$type": "or",
                        "clauses": [
                            {"$type": "primaryId", "value": "removable_media_devices"},
                            {"$type": "and", "clauses": [
                                {"$type": "vendorId", "value": "0951"},
                                {"$type": "productId", "value": "1666"}
                            ]}
                        ]
                    }
                },
                {"name": "No id"}
            ],
            "rules": [
                {
                    "id": "772cef80-229f-48b4-bd17-a69ed2a18a68",
                    "name": "Deny all removable media",
                    "includeGroups": ["3f082cd3-f701-4c21-9a6a-ed115c28cf9f"],
                    "entries": [
                        {
                            "$type": "removableMedia",
                            "enforcement": {"$type": "deny", "options": ["send_event"]},
                            "access": ["read", "write", "execute"]
                        }
                    ]
                }
            ],
            "settings": {"global": {"defaultEnforcement": "allow"}}
        })
    }

    #[test]
    fn reads_groups_rules_and_settings() {
        let parsed = parse_document(&policy(), Path::new("mac/deny.json")).expect("parsed");
        assert_eq!(parsed.groups.len(), 1);
        let group = &parsed.groups[0];
        assert_eq!(group.format, Format::Mac);
        assert_eq!(group.group_type, GroupType::MacDevice);
        assert_eq!(group.match_type, "or");
        assert_eq!(group.descriptors().count(), 1);
        assert_eq!(group.clauses().count(), 1);

        let rule = &parsed.rules[0];
        assert_eq!(rule.rule_index, 1);
        assert_eq!(rule.entry_type(), EntryType::MacRemovableMedia);
        let entry = &rule.entries[0];
        assert_eq!(entry.id, "772cef80-229f-48b4-bd17-a69ed2a18a68-1");
        assert_eq!(entry.enforcement, Enforcement::Deny);
        assert_eq!(entry.access_mask, 7);

        let settings = parsed.settings.expect("settings");
        assert_eq!(settings.default_enforcement, DefaultEnforcement::Allow);
    }

    #[test]
    fn group_json_round_trips() {
        let parsed = parse_document(&policy(), Path::new("deny.json")).expect("parsed");
        let json = parsed.groups[0].to_mac_json().expect("mac group");
        assert_eq!(json, policy()["groups"][0]);
    }

    #[test]
    fn unknown_entry_type_skips_the_rule() {
        let value = json!({"rules": [{"id": "r", "entries": [{"$type": "floppy", "enforcement": {"$type": "deny"}}]}]});
        let parsed = parse_document(&value, Path::new("x.json")).expect("parsed");
        assert!(parsed.rules.is_empty());
    }

    #[test]
    fn rule_without_name_is_unnamed() {
        let value = json!({"rules": [{"id": "r", "entries": [
            {"$type": "removableMedia", "enforcement": {"$type": "deny"}, "access": ["read"]}
        ]}]});
        let parsed = parse_document(&value, Path::new("x.json")).expect("parsed");
        assert_eq!(parsed.rules[0].name, "?");
    }
}
