use std::fmt::{self, Display, Formatter};

use policy_xml::{close_tag, open_tag, text_element};
use serde::Serialize;

/// Group-backed condition kinds allowed under `<Parameters>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConditionKind {
    Network,
    File,
    VPNConnection,
}

impl ConditionKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Network" => Some(ConditionKind::Network),
            "File" => Some(ConditionKind::File),
            "VPNConnection" => Some(ConditionKind::VPNConnection),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ConditionKind::Network => "Network",
            ConditionKind::File => "File",
            ConditionKind::VPNConnection => "VPNConnection",
        }
    }
}

impl Display for ConditionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub match_type: String,
    pub groups: Vec<String>,
}

impl Condition {
    pub fn to_xml(&self, indent: &str) -> String {
        let tag = self.kind.tag();
        let inner = format!("{indent}\t");
        let mut out = open_tag(indent, tag, &[("MatchType", &self.match_type)]);
        for group in &self.groups {
            out.push_str(&text_element(&inner, "GroupId", group));
        }
        out.push_str(&close_tag(indent, tag));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParameterNode {
    Condition(Condition),
    Parameters(Parameters),
}

/// Boolean combination of group-backed conditions attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameters {
    pub match_type: String,
    pub conditions: Vec<ParameterNode>,
}

impl Parameters {
    pub fn new(match_type: impl Into<String>) -> Self {
        Self {
            match_type: match_type.into(),
            conditions: Vec::new(),
        }
    }

    /// Every referenced group id, in document order.
    pub fn group_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.conditions {
            match node {
                ParameterNode::Condition(condition) => {
                    out.extend(condition.groups.iter().map(String::as_str))
                }
                ParameterNode::Parameters(nested) => out.extend(nested.group_ids()),
            }
        }
        out
    }

    /// Leaf conditions with their nesting depth (0 for direct children).
    pub fn flatten(&self) -> Vec<(usize, &Condition)> {
        let mut out = Vec::new();
        self.collect(0, &mut out);
        out
    }

    fn collect<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a Condition)>) {
        for node in &self.conditions {
            match node {
                ParameterNode::Condition(condition) => out.push((depth, condition)),
                ParameterNode::Parameters(nested) => nested.collect(depth + 1, out),
            }
        }
    }

    pub fn to_xml(&self, indent: &str) -> String {
        let inner = format!("{indent}\t");
        let mut out = open_tag(indent, "Parameters", &[("MatchType", &self.match_type)]);
        for node in &self.conditions {
            match node {
                ParameterNode::Condition(condition) => out.push_str(&condition.to_xml(&inner)),
                ParameterNode::Parameters(nested) => out.push_str(&nested.to_xml(&inner)),
            }
        }
        out.push_str(&close_tag(indent, "Parameters"));
        out
    }
}
