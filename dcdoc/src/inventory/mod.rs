//! Every group and rule found under the source paths, indexed by id.
//!
//! The inventory is append-only. Duplicates are kept; the first object seen
//! for an id and format is authoritative and later objects that differ from
//! it are recorded as [`Conflict`]s when they are loaded.

pub mod query;
pub mod synthesize;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::model::{Format, Group, PolicyRule, Settings};
use crate::naming::file_stem;
use crate::parse::{self, SourceKind};

pub use query::{GroupsByFormat, QueriedRules, QueryPhase, QueryResult, RuleGroups, RuleQuery};
pub use synthesize::{missing_oma_uri, OmaUriSource};

#[derive(Debug, Clone, Default)]
pub struct InventoryOptions {
    /// Where synthesized OMA-URI files are written; `None` keeps them in memory.
    pub oma_uri_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Group,
    Rule,
}

/// Two objects with the same id and format that are not equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub id: String,
    pub format: Format,
    pub first_path: Option<PathBuf>,
    pub second_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct Inventory {
    options: InventoryOptions,
    groups: Vec<Group>,
    rules: Vec<PolicyRule>,
    groups_by_id: IndexMap<String, Vec<usize>>,
    rules_by_id: IndexMap<String, Vec<usize>>,
    settings: Vec<(PathBuf, Settings)>,
    conflicts: Vec<Conflict>,
}

impl Inventory {
    pub fn new(options: InventoryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &InventoryOptions {
        &self.options
    }

    /// Load every policy file under `paths`. Directories are walked
    /// recursively in file-name order. Returns the number of files read.
    pub fn load(&mut self, paths: &[PathBuf]) -> usize {
        let mut loaded = 0;
        for path in paths {
            if path.is_dir() {
                for entry in WalkDir::new(path).sort_by_file_name() {
                    match entry {
                        Ok(entry) if entry.file_type().is_file() => {
                            loaded += usize::from(self.load_file(entry.path()));
                        }
                        Ok(_) => {}
                        Err(err) => warn!(event = "Load", error = %err, "unable to walk directory"),
                    }
                }
            } else {
                loaded += usize::from(self.load_file(path));
            }
        }
        debug!(
            event = "Load",
            files = loaded,
            groups = self.groups.len(),
            rules = self.rules.len(),
            conflicts = self.conflicts.len()
        );
        loaded
    }

    /// Load a single file; `false` when it was skipped or failed.
    pub fn load_file(&mut self, path: &Path) -> bool {
        if SourceKind::from_path(path).is_none() {
            warn!(event = "Load", path = %path.display(), "unable to process file");
            return false;
        }
        match parse::parse_path(path) {
            Some(Ok(parsed)) => {
                for (n, group) in parsed.groups.into_iter().enumerate() {
                    self.add_group(group, n + 1);
                }
                for rule in parsed.rules {
                    self.add_rule(rule);
                }
                if let Some(settings) = parsed.settings {
                    self.settings.push((path.to_path_buf(), settings));
                }
                true
            }
            Some(Err(err)) => {
                error!(event = "Load", path = %path.display(), error = %err, "failed to parse");
                false
            }
            None => false,
        }
    }

    /// Add a group; `ordinal` is its 1-based position in its source file and
    /// names the group when it has no name.
    pub fn add_group(&mut self, mut group: Group, ordinal: usize) {
        if group.is_unnamed() {
            let stem = group.path.as_deref().map(file_stem).unwrap_or_default();
            group.name = format!("{stem}_{ordinal}");
        }
        debug!(event = "Load", id = %group.id, format = %group.format, name = %group.name, "adding group");

        let existing = self.groups_by_id.get(&group.id).and_then(|indexes| {
            indexes
                .iter()
                .map(|&index| &self.groups[index])
                .find(|known| known.format == group.format)
        });
        let conflict = existing.filter(|first| **first != group).map(|first| Conflict {
            kind: ConflictKind::Group,
            id: group.id.clone(),
            format: group.format,
            first_path: first.path.clone(),
            second_path: group.path.clone(),
        });
        if let Some(conflict) = conflict {
            self.record_conflict(conflict);
        }

        self.groups_by_id
            .entry(group.id.clone())
            .or_default()
            .push(self.groups.len());
        self.groups.push(group);
    }

    pub fn add_rule(&mut self, rule: PolicyRule) {
        debug!(
            event = "Load",
            id = %rule.id,
            format = %rule.format,
            index = rule.rule_index,
            "adding rule"
        );
        let existing = self.rules_by_id.get(&rule.id).and_then(|indexes| {
            indexes
                .iter()
                .map(|&index| &self.rules[index])
                .find(|known| known.format == rule.format)
        });
        let conflict = existing.filter(|first| **first != rule).map(|first| Conflict {
            kind: ConflictKind::Rule,
            id: rule.id.clone(),
            format: rule.format,
            first_path: first.path.clone(),
            second_path: rule.path.clone(),
        });
        if let Some(conflict) = conflict {
            self.record_conflict(conflict);
        }

        self.rules_by_id
            .entry(rule.id.clone())
            .or_default()
            .push(self.rules.len());
        self.rules.push(rule);
    }

    fn record_conflict(&mut self, conflict: Conflict) {
        warn!(
            event = "Conflict",
            kind = ?conflict.kind,
            id = %conflict.id,
            format = %conflict.format,
            first = %path_text(conflict.first_path.as_deref()),
            second = %path_text(conflict.second_path.as_deref()),
            "conflicting definitions, keeping the first"
        );
        self.conflicts.push(conflict);
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Groups with `id` in load order.
    pub fn groups_with_id<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups_by_id
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&index| &self.groups[index])
    }

    /// Settings read from the macOS policy at `path`, if any.
    pub fn settings_for(&self, path: &Path) -> Option<&Settings> {
        self.settings
            .iter()
            .find(|(source, _)| source == path)
            .map(|(_, settings)| settings)
    }
}

fn path_text(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string()).unwrap_or_default()
}
