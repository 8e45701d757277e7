use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use policy_xml::{close_tag, comment, open_tag, text_element};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ConversionError;
use crate::mac_convert;
use crate::model::{Entry, EntryType, Format, OMA_URI_ROOT, UNNAMED};
use crate::naming::quote_plus;

/// Included/excluded group references plus the permission entries that
/// apply when they match.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRule {
    pub id: String,
    pub name: String,
    pub format: Format,
    /// Format the rule was read from; unchanged by OMA-URI synthesis.
    pub origin: Format,
    pub path: Option<PathBuf>,
    /// 1-based position of the rule inside its source file.
    pub rule_index: usize,
    pub included_groups: Vec<String>,
    pub excluded_groups: Vec<String>,
    pub entries: Vec<Entry>,
}

impl PolicyRule {
    pub fn new(id: impl Into<String>, format: Format) -> Self {
        Self {
            id: id.into(),
            name: UNNAMED.to_string(),
            format,
            origin: format,
            path: None,
            rule_index: 0,
            included_groups: Vec::new(),
            excluded_groups: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        let fallback = match self.origin {
            Format::Mac => EntryType::MacGeneric,
            Format::Gpo | Format::OmaUri => EntryType::WindowsDevice,
        };
        let mut types = self.entries.iter().map(|entry| entry.entry_type);
        let Some(first) = types.next() else {
            return fallback;
        };
        if types.all(|entry_type| entry_type == first) {
            first
        } else {
            EntryType::generic_for(self.origin)
        }
    }

    /// Every group id the rule references: included, excluded, then entry
    /// conditions.
    pub fn group_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .included_groups
            .iter()
            .chain(&self.excluded_groups)
            .map(String::as_str)
            .collect();
        for entry in &self.entries {
            ids.extend(entry.group_ids());
        }
        ids
    }

    pub fn oma_uri(&self) -> String {
        format!(
            "{OMA_URI_ROOT}/DeviceControl/PolicyRules/{}/RuleData",
            quote_plus(&self.id)
        )
    }

    pub fn to_xml(&self, indent: &str) -> String {
        let inner = format!("{indent}\t");
        let ids = format!("{inner}\t");
        // The space before `>` is part of the established output shape.
        let mut out = format!("{indent}<PolicyRule Id=\"{}\" >\n", policy_xml::attr_value(&self.id));
        out.push_str(&comment(&inner, &self.oma_uri()));
        out.push_str(&text_element(&inner, "Name", &self.name));
        out.push_str(&open_tag(&inner, "IncludedIdList", &[]));
        for group in &self.included_groups {
            out.push_str(&text_element(&ids, "GroupId", group));
        }
        out.push_str(&close_tag(&inner, "IncludedIdList"));
        out.push_str(&open_tag(&inner, "ExcludedIdList", &[]));
        for group in &self.excluded_groups {
            out.push_str(&text_element(&ids, "GroupId", group));
        }
        out.push_str(&close_tag(&inner, "ExcludedIdList"));
        for entry in &self.entries {
            out.push_str(&entry.to_xml(&inner));
        }
        out.push_str(&close_tag(indent, "PolicyRule"));
        out
    }

    /// macOS JSON of this rule; Windows rules go through [`mac_convert`].
    pub fn to_mac_json(&self) -> Result<Value, ConversionError> {
        match self.origin {
            Format::Mac => Ok(json!({
                "id": self.id,
                "name": self.name,
                "includeGroups": self.included_groups,
                "excludeGroups": self.excluded_groups,
                "entries": self.entries.iter().map(Entry::to_mac_json).collect::<Vec<_>>(),
            })),
            Format::Gpo | Format::OmaUri => mac_convert::rule_to_mac(self),
        }
    }
}

impl PartialEq for PolicyRule {
    fn eq(&self, other: &Self) -> bool {
        self.to_xml("\t") == other.to_xml("\t")
    }
}

impl Eq for PolicyRule {}

impl Hash for PolicyRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_xml("\t").hash(state);
    }
}
