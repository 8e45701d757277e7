//! Windows policy XML to macOS device control JSON.
//!
//! Conversion is all or nothing: the first construct macOS cannot express
//! aborts it with a [`ConversionError`].

use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ConversionError, ParseError};
use crate::mac_mappings::{self, PRIMARY_ID, VID_PID};
use crate::model::{Clause, Entry, EntryType, Group, GroupType, PolicyRule, Property};
use crate::parse;

const PRINT_MASK: u32 = 0x40;

/// Convert assembled `<Groups>` and `<PolicyRules>` documents into a macOS
/// policy object with `groups` and `rules`.
pub fn convert(groups_xml: &str, rules_xml: &str) -> Result<Value, ConversionError> {
    let source = Path::new("assembled policy");
    let groups = policy_xml::parse_str(groups_xml).map_err(ParseError::from)?;
    let groups = parse::xml::parse_document(&groups, source)?.groups;
    let rules = policy_xml::parse_str(rules_xml).map_err(ParseError::from)?;
    let rules = parse::xml::parse_document(&rules, source)?.rules;
    debug!(event = "MacConvert", groups = groups.len(), rules = rules.len());

    let groups = groups
        .iter()
        .map(group_to_mac)
        .collect::<Result<Vec<_>, _>>()?;
    let rules = rules
        .iter()
        .map(rule_to_mac)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({"groups": groups, "rules": rules}))
}

pub fn group_to_mac(group: &Group) -> Result<Value, ConversionError> {
    if group.group_type != GroupType::Device {
        return Err(ConversionError::GroupType {
            id: group.id.clone(),
            group_type: group.group_type.as_str().to_string(),
        });
    }
    let mappings = mac_mappings::mappings();
    let operator = mappings
        .mac_match_type(&group.match_type)
        .ok_or_else(|| ConversionError::MatchType {
            id: group.id.clone(),
            match_type: group.match_type.clone(),
        })?;

    let mut root = Clause::new(operator);
    for descriptor in group.descriptors() {
        match descriptor.name.as_str() {
            VID_PID => {
                let ids = vid_pid_properties(&descriptor.value);
                if operator == "and" || ids.len() < 2 {
                    root.properties.extend(ids);
                } else {
                    let mut both = Clause::new("and");
                    both.properties = ids;
                    root.sub_clauses.push(both);
                }
            }
            PRIMARY_ID => {
                let name = mappings
                    .mac_descriptors(PRIMARY_ID)
                    .first()
                    .copied()
                    .unwrap_or("primaryId");
                root.properties.push(Property::new(
                    name,
                    mappings.mac_primary_id(&descriptor.value),
                ));
            }
            tag => {
                let name = mappings.mac_descriptors(tag).first().copied().ok_or_else(|| {
                    ConversionError::Descriptor {
                        id: group.id.clone(),
                        descriptor: tag.to_string(),
                    }
                })?;
                root.properties.push(Property::new(name, descriptor.value.clone()));
            }
        }
    }

    Ok(json!({
        "$type": "device",
        "id": group.id,
        "name": group.name,
        "query": root.to_mac_json(),
    }))
}

/// `0951_1666` → vendorId and productId leaves; `*` halves are dropped.
fn vid_pid_properties(value: &str) -> Vec<Property> {
    let mappings = mac_mappings::mappings();
    let names = mappings.mac_descriptors(VID_PID);
    value
        .split('_')
        .zip(names)
        .filter(|(part, _)| !part.is_empty() && *part != "*")
        .map(|(part, name)| Property::new(name, part))
        .collect()
}

pub fn rule_to_mac(rule: &PolicyRule) -> Result<Value, ConversionError> {
    let entries = rule
        .entries
        .iter()
        .map(|entry| entry_to_mac(rule, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "id": rule.id,
        "name": rule.name,
        "includeGroups": rule.included_groups,
        "excludeGroups": rule.excluded_groups,
        "entries": entries,
    }))
}

fn entry_to_mac(rule: &PolicyRule, entry: &Entry) -> Result<Value, ConversionError> {
    let unsupported = |reason: &str| ConversionError::Entry {
        rule: rule.id.clone(),
        entry: entry.id.clone(),
        reason: reason.to_string(),
    };
    if entry.access_mask & PRINT_MASK != 0 {
        return Err(unsupported("print access has no macOS equivalent"));
    }
    if entry.parameters.is_some() {
        return Err(unsupported("parameters have no macOS equivalent"));
    }
    if entry.sid.is_some() || entry.computer_sid.is_some() {
        return Err(unsupported("SID conditions have no macOS equivalent"));
    }

    let mut access: Vec<&str> = Vec::new();
    for access_type in EntryType::WindowsDevice.access_types() {
        if let Some(token) = access_type.token {
            if entry.access_mask & access_type.mask != 0 && !access.contains(&token) {
                access.push(token);
            }
        }
    }
    let options: Vec<&str> = entry
        .enforcement
        .notification_bits()
        .iter()
        .filter(|bit| entry.options & bit.mask != 0)
        .filter_map(|bit| bit.mac_option)
        .collect();

    let mut enforcement = json!({"$type": entry.enforcement.as_mac()});
    if !options.is_empty() {
        enforcement["options"] = json!(options);
    }
    Ok(json!({
        "$type": "removableMedia",
        "id": entry.id,
        "enforcement": enforcement,
        "access": access,
    }))
}
