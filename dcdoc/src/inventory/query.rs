//! Rule selection, group resolution and assembly of a [`QueryResult`].

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::inventory::{missing_oma_uri, Inventory};
use crate::mac_convert;
use crate::model::{EntryType, Format, Group, PolicyRule, Settings};
use crate::naming::web_path;
use crate::oma_uri::{IntuneCustomRow, OmaUriRow};
use crate::support::{IntuneUx, Support, SupportCheck, Windows};

/// Which rules a query selects, by source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleQuery {
    All,
    PathContains(String),
    PathEquals(PathBuf),
}

impl RuleQuery {
    /// Read `path == '<p>'`, `path.str.contains('<pattern>')`, `*`, or a bare
    /// pattern matched against the path.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || text == "*" {
            return RuleQuery::All;
        }
        let equals = text
            .strip_prefix("path")
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix("=="))
            .and_then(unquote);
        if let Some(value) = equals {
            return RuleQuery::PathEquals(PathBuf::from(value));
        }
        let contains = text
            .strip_prefix("path.str.contains(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(unquote);
        match contains.unwrap_or(text) {
            "" | "(.*)" | ".*" => RuleQuery::All,
            pattern => RuleQuery::PathContains(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: Option<&Path>) -> bool {
        match self {
            RuleQuery::All => true,
            RuleQuery::PathContains(pattern) => {
                path.is_some_and(|path| pattern_matches(pattern, &web_path(path)))
            }
            RuleQuery::PathEquals(expected) => {
                path.is_some_and(|path| web_path(path) == web_path(expected))
            }
        }
    }
}

fn unquote(text: &str) -> Option<&str> {
    let text = text.trim();
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    text.strip_prefix(quote)?.strip_suffix(quote)
}

/// Regex search on the path; patterns that are not valid regexes match as
/// plain substrings.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(path),
        Err(_) => path.contains(pattern),
    }
}

impl Display for RuleQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RuleQuery::All => f.write_str("*"),
            RuleQuery::PathContains(needle) => write!(f, "path.str.contains('{needle}')"),
            RuleQuery::PathEquals(path) => write!(f, "path == '{}'", path.display()),
        }
    }
}

/// The authoritative instance of one group id per format.
#[derive(Debug, Clone, Default)]
pub struct GroupsByFormat {
    pub gpo: Option<Group>,
    pub oma_uri: Option<Group>,
    pub mac: Option<Group>,
}

impl GroupsByFormat {
    pub fn get(&self, format: Format) -> Option<&Group> {
        match format {
            Format::Gpo => self.gpo.as_ref(),
            Format::OmaUri => self.oma_uri.as_ref(),
            Format::Mac => self.mac.as_ref(),
        }
    }

    fn slot(&mut self, format: Format) -> &mut Option<Group> {
        match format {
            Format::Gpo => &mut self.gpo,
            Format::OmaUri => &mut self.oma_uri,
            Format::Mac => &mut self.mac,
        }
    }
}

/// Rules selected by a [`RuleQuery`].
#[derive(Debug, Clone, Default)]
pub struct QueriedRules {
    /// Authoritative rule per id, for each format.
    pub by_format: BTreeMap<Format, IndexMap<String, PolicyRule>>,
    /// Authoritative rules by ascending rule index, then load order.
    pub all: Vec<PolicyRule>,
    /// Intune rows keyed by OMA-URI, synthesized where missing.
    pub oma_uri: IndexMap<String, IntuneCustomRow>,
}

/// Groups a rule references, resolved against the inventory.
#[derive(Debug, Clone, Default)]
pub struct RuleGroups {
    pub gpo: Vec<Group>,
    pub oma_uri: Vec<Group>,
    pub mac: Vec<Group>,
    pub included: Vec<Group>,
    pub excluded: Vec<Group>,
    pub entries: Vec<Group>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryPhase {
    Filtering,
    ResolvingGroups,
    ProjectingMac,
    Summarizing,
    Done,
    /// Finished, but the macOS projection failed.
    Degraded,
}

/// Everything a report needs about one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub rules: Vec<PolicyRule>,
    pub groups: Vec<Group>,
    pub groups_xml: String,
    pub rules_xml: String,
    pub oma_uri: IndexMap<String, IntuneCustomRow>,
    pub paths: Vec<String>,
    pub mac_policy: Option<Value>,
    pub mac_error: Option<String>,
    pub intune_ux_support: Support,
    pub windows_support: Support,
    pub entry_type: EntryType,
    pub mixed_entry_types: bool,
    pub settings: Option<Settings>,
    pub phase: QueryPhase,
}

impl QueryResult {
    pub fn is_degraded(&self) -> bool {
        self.phase == QueryPhase::Degraded
    }

    /// Add policy-wide settings to the Intune rows and the macOS policy.
    pub fn apply_settings(&mut self, settings: &Settings) {
        for row in settings.intune_rows() {
            self.oma_uri.insert(row.oma_uri.clone(), row);
        }
        if let Some(policy) = self.mac_policy.as_mut() {
            policy["settings"] = settings.to_mac_json();
        }
        self.settings = Some(settings.clone());
    }
}

impl Inventory {
    /// Select rules whose source path matches `query`.
    pub fn query_rules(&self, query: &RuleQuery) -> QueriedRules {
        let mut matching: Vec<&PolicyRule> = self
            .rules()
            .iter()
            .filter(|rule| query.matches(rule.path.as_deref()))
            .collect();
        matching.sort_by_key(|rule| rule.rule_index);
        debug!(event = "Query", phase = ?QueryPhase::Filtering, query = %query, matched = matching.len());

        let mut queried = QueriedRules::default();
        for rule in matching {
            let for_format = queried.by_format.entry(rule.format).or_default();
            if let Some(existing) = for_format.get(&rule.id) {
                if existing != rule {
                    debug!(event = "Query", id = %rule.id, "ignoring conflicting rule");
                }
                continue;
            }
            for_format.insert(rule.id.clone(), rule.clone());
            if rule.format == Format::OmaUri {
                queried.oma_uri.insert(rule.oma_uri(), rule.to_oma_uri_row());
            }
            queried.all.push(rule.clone());
        }

        let dir = self.options().oma_uri_dir.as_deref();
        for rule in &queried.all {
            let oma_uri = rule.oma_uri();
            if !queried.oma_uri.contains_key(&oma_uri) {
                let synthesized = missing_oma_uri(rule, dir);
                queried.oma_uri.insert(oma_uri, synthesized.to_oma_uri_row());
            }
        }
        queried
    }

    /// Authoritative groups for `id` per format, with the OMA-URI instance
    /// synthesized from GPO (else macOS) when missing.
    pub fn get_group_by_id(&self, id: &str) -> Option<GroupsByFormat> {
        let mut found = false;
        let mut groups = GroupsByFormat::default();
        for group in self.groups_with_id(id) {
            found = true;
            let slot = groups.slot(group.format);
            match slot.as_ref() {
                Some(existing) if existing != group => {
                    debug!(event = "Query", id = %id, "ignoring conflicting group");
                }
                Some(_) => {}
                None => *slot = Some(group.clone()),
            }
        }
        if !found {
            warn!(event = "Query", id = %id, "no group found");
            return None;
        }

        if groups.oma_uri.is_none() {
            let dir = self.options().oma_uri_dir.as_deref();
            groups.oma_uri = groups
                .gpo
                .as_ref()
                .or(groups.mac.as_ref())
                .map(|source| missing_oma_uri(source, dir));
        }
        Some(groups)
    }

    /// Resolve every group `rule` references. Groups used in entry conditions
    /// are never contributed to the macOS list.
    pub fn groups_for_rule(&self, rule: &PolicyRule) -> RuleGroups {
        let mut out = RuleGroups::default();
        let resolve = |id: &str, out: &mut RuleGroups, include_mac: bool| -> Option<Group> {
            let groups = self.get_group_by_id(id)?;
            out.gpo.extend(groups.gpo.clone());
            out.oma_uri.extend(groups.oma_uri.clone());
            if include_mac {
                out.mac.extend(groups.mac.clone());
            }
            groups.get(rule.format).cloned()
        };

        for id in &rule.included_groups {
            if let Some(group) = resolve(id.as_str(), &mut out, true) {
                out.included.push(group);
            }
        }
        for id in &rule.excluded_groups {
            if let Some(group) = resolve(id.as_str(), &mut out, true) {
                out.excluded.push(group);
            }
        }
        for entry in &rule.entries {
            for id in entry.group_ids() {
                if let Some(group) = resolve(id, &mut out, false) {
                    out.entries.push(group);
                }
            }
        }
        out
    }

    /// Select, resolve, project and summarize the rules matching `query`.
    pub fn run_query(&self, query: &RuleQuery) -> QueryResult {
        let queried = self.query_rules(query);
        let mut oma_uri = queried.oma_uri;

        debug!(event = "Query", phase = ?QueryPhase::ResolvingGroups, rules = queried.all.len());
        let mut rules: Vec<PolicyRule> = Vec::new();
        let mut groups: IndexMap<String, Group> = IndexMap::new();
        let mut mac_groups: IndexMap<String, Group> = IndexMap::new();
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entry_type: Option<EntryType> = None;
        let mut mixed_entry_types = false;

        for rule in queried.all {
            if let Some(existing) = rules.iter().find(|known| known.id == rule.id) {
                if *existing != rule {
                    debug!(event = "Query", id = %rule.id, "rule already selected in another format");
                }
                continue;
            }

            let rule_type = rule.entry_type();
            match entry_type {
                None => entry_type = Some(rule_type),
                Some(current) if current != rule_type && !mixed_entry_types => {
                    entry_type = Some(EntryType::generic_for(rule.origin));
                    mixed_entry_types = true;
                }
                Some(_) => {}
            }
            let is_mac_type = entry_type.is_some_and(EntryType::is_mac);

            paths.extend(rule.path.clone());
            let resolved = self.groups_for_rule(&rule);
            for group in resolved.gpo.iter().chain(&resolved.oma_uri) {
                if groups.contains_key(&group.id) {
                    continue;
                }
                if !is_mac_type {
                    paths.extend(group.path.clone());
                }
                groups.insert(group.id.clone(), group.clone());
            }
            for group in &resolved.oma_uri {
                oma_uri.insert(group.oma_uri(), group.to_oma_uri_row());
            }
            for group in resolved.mac {
                mac_groups.entry(group.id.clone()).or_insert(group);
            }
            rules.push(rule);
        }

        let entry_type = entry_type.unwrap_or(EntryType::WindowsDevice);
        // macOS results document the macOS groups, not their OMA-URI copies
        let groups: Vec<Group> = groups
            .into_iter()
            .map(|(id, group)| match mac_groups.swap_remove(&id) {
                Some(mac) if entry_type.is_mac() => mac,
                _ => group,
            })
            .collect();
        let groups_xml = wrap_xml("Groups", groups.iter().map(|group| group.to_xml("\t")));
        let rules_xml = wrap_xml("PolicyRules", rules.iter().map(|rule| rule.to_xml("\t")));

        debug!(event = "Query", phase = ?QueryPhase::ProjectingMac, entry_type = %entry_type);
        let mac_result = if entry_type.is_mac() {
            project_mac(&groups, &rules)
        } else {
            mac_convert::convert(&groups_xml, &rules_xml)
        };
        let (mac_policy, mac_error) = match mac_result {
            Ok(policy) => (Some(policy), None),
            Err(err) => {
                warn!(event = "Query", phase = ?QueryPhase::Degraded, error = %err, "failed to convert policy to mac");
                (None, Some(err.to_string()))
            }
        };

        debug!(event = "Query", phase = ?QueryPhase::Summarizing);
        let intune_ux_support = IntuneUx.summarize(&groups, &rules);
        let windows_support = Windows.summarize(&groups, &rules);

        let phase = if mac_error.is_some() {
            QueryPhase::Degraded
        } else {
            QueryPhase::Done
        };
        debug!(event = "Query", phase = ?phase, rules = rules.len(), groups = groups.len());

        QueryResult {
            rules,
            groups,
            groups_xml,
            rules_xml,
            oma_uri,
            paths: dedup_web_paths(&paths),
            mac_policy,
            mac_error,
            intune_ux_support,
            windows_support,
            entry_type,
            mixed_entry_types,
            settings: None,
            phase,
        }
    }
}

fn wrap_xml(root: &str, children: impl Iterator<Item = String>) -> String {
    let mut out = format!("<{root}>\n");
    for child in children {
        out.push_str(&child);
    }
    out.push_str(&format!("</{root}>\n"));
    out
}

fn project_mac(groups: &[Group], rules: &[PolicyRule]) -> Result<Value, crate::error::ConversionError> {
    let groups = groups
        .iter()
        .map(Group::to_mac_json)
        .collect::<Result<Vec<_>, _>>()?;
    let rules = rules
        .iter()
        .map(PolicyRule::to_mac_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({"groups": groups, "rules": rules}))
}

fn dedup_web_paths(paths: &[PathBuf]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        let path = web_path(path);
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}
