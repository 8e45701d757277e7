//! Markdown documentation for query results, the scenario README and the
//! colored terminal summary.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use colored::Colorize;
use serde::Serialize;
use tracing::{error, info};

use crate::clause_table::{generate_table_for_clauses, table_width};
use crate::config::GenerateTargets;
use crate::error::TemplateError;
use crate::inventory::QueryResult;
use crate::model::{Enforcement, Entry, Group, GroupType, PolicyRule};
use crate::naming::{clean_up_name, web_path};
use crate::oma_uri::{IntuneCustomRow, OmaDataType};
use crate::support::Support;
use crate::templates::Templates;

const NOT_GRANTED: &str = "-";

fn granted_icon(enforcement: Enforcement) -> &'static str {
    match enforcement {
        Enforcement::Allow => ":white_check_mark:",
        Enforcement::Deny => ":x:",
        Enforcement::AuditAllowed | Enforcement::AuditDenied => ":page_facing_up:",
    }
}

/// Anchor of an object's section.
pub fn anchor(name: &str) -> String {
    clean_up_name(name, "-")
}

/// `path` relative to `base`, computed lexically from absolute forms.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = absolute(path);
    let base = absolute(base);
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part);
    }
    out
}

fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for part in joined.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn link(path: &str, dest: &Path) -> String {
    web_path(&relative_to(Path::new(path), dest))
}

#[derive(Debug, Serialize)]
struct RuleSummary<'a> {
    name: &'a str,
    anchor: String,
    enforcements: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct DescriptionContext<'a> {
    rule_count: usize,
    group_count: usize,
    entry_type: &'a str,
    mixed_entry_types: bool,
    rules: Vec<RuleSummary<'a>>,
    result: &'a QueryResult,
}

/// Generated summary used when no description is supplied.
pub fn describe(templates: &Templates, result: &QueryResult) -> Result<String, TemplateError> {
    let rules = result
        .rules
        .iter()
        .map(|rule| {
            let mut enforcements: Vec<&str> = Vec::new();
            for entry in &rule.entries {
                let label = entry.enforcement.label();
                if !enforcements.contains(&label) {
                    enforcements.push(label);
                }
            }
            RuleSummary {
                name: &rule.name,
                anchor: anchor(&rule.name),
                enforcements,
            }
        })
        .collect();
    templates.render_description(DescriptionContext {
        rule_count: result.rules.len(),
        group_count: result.groups.len(),
        entry_type: result.entry_type.label(),
        mixed_entry_types: result.mixed_entry_types,
        rules,
        result,
    })
}

fn group_name<'a>(result: &'a QueryResult, id: &'a str) -> &'a str {
    result
        .groups
        .iter()
        .find(|group| group.id == id)
        .map(|group| group.name.as_str())
        .unwrap_or(id)
}

fn group_links(result: &QueryResult, ids: &[String]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| {
            let name = group_name(result, id);
            format!("[{name}](#{})", anchor(name))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_entry_row(out: &mut String, result: &QueryResult, entry: &Entry) {
    let computer = entry.computer_sid.as_deref().unwrap_or("All Computers");
    let _ = write!(
        out,
        "| {} | {} | {} | {} | {} |",
        entry.id,
        entry.enforcement.label(),
        entry.notifications().join(", "),
        entry.sid_label(),
        computer
    );
    for (_, granted) in entry.permissions(result.entry_type) {
        let icon = if granted {
            granted_icon(entry.enforcement)
        } else {
            NOT_GRANTED
        };
        let _ = write!(out, " {icon} |");
    }
    out.push('\n');
}

fn render_rule(result: &QueryResult, rule: &PolicyRule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- Id: `{}`", rule.id);
    let _ = writeln!(out, "- Included groups: {}", group_links(result, &rule.included_groups));
    let _ = writeln!(out, "- Excluded groups: {}\n", group_links(result, &rule.excluded_groups));

    let labels: Vec<&str> = result
        .entry_type
        .access_types()
        .iter()
        .map(|access| access.label)
        .collect();
    out.push_str("| Entry | Enforcement | Notifications | User | Computer |");
    for label in &labels {
        let _ = write!(out, " {label} |");
    }
    out.push_str("\n|---|---|---|---|---|");
    for _ in &labels {
        out.push_str("---|");
    }
    out.push('\n');
    for entry in &rule.entries {
        render_entry_row(&mut out, result, entry);
    }
    out.push('\n');

    for entry in &rule.entries {
        let Some(parameters) = &entry.parameters else {
            continue;
        };
        let _ = writeln!(out, "Conditions for `{}` ({}):\n", entry.id, parameters.match_type);
        for (depth, condition) in parameters.flatten() {
            let groups: Vec<&str> = condition
                .groups
                .iter()
                .map(|id| group_name(result, id))
                .collect();
            let _ = writeln!(
                out,
                "{}- {} ({}): {}",
                "  ".repeat(depth),
                condition.kind.tag(),
                condition.match_type,
                groups.join(", ")
            );
        }
        out.push('\n');
    }
    out
}

fn render_group(group: &Group) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- Id: `{}`", group.id);
    let _ = writeln!(out, "- Type: {}", group.group_type.label());
    let _ = writeln!(out, "- Match type: {}\n", group.match_type);

    if group.group_type == GroupType::MacDevice || group.clauses().next().is_some() {
        let rows = generate_table_for_clauses(&[group.root_clause()], 1);
        let width = table_width(&rows);
        out.push('|');
        for level in 0..width {
            let _ = write!(out, " {} |", if level == 0 { "Operator" } else { "" });
        }
        out.push_str(" Property | Value |\n|");
        for _ in 0..width + 2 {
            out.push_str("---|");
        }
        out.push('\n');
        for row in rows {
            out.push('|');
            for level in 0..width {
                let _ = write!(out, " {} |", row.cells.get(level).map(String::as_str).unwrap_or(""));
            }
            let _ = writeln!(
                out,
                " {} | {} |",
                group.group_type.property_label(&row.property.name),
                row.property.value
            );
        }
    } else {
        out.push_str("| Property | Value |\n|---|---|\n");
        for property in group.descriptors() {
            let _ = writeln!(
                out,
                "| {} | {} |",
                group.group_type.property_label(&property.name),
                property.value
            );
        }
    }
    out.push('\n');
    out
}

#[derive(Debug, Serialize)]
struct Section<'a> {
    name: &'a str,
    id: &'a str,
    anchor: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct SettingsView<'a> {
    default_enforcement: &'a str,
    device_control_enabled: bool,
    navigation_target: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct IntuneRowView<'a> {
    name: &'a str,
    description: &'a str,
    oma_uri: &'a str,
    data_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SupportView<'a> {
    label: &'static str,
    supported: bool,
    checked: usize,
    issues: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct SourceLink<'a> {
    path: &'a str,
    link: String,
}

#[derive(Debug, Serialize)]
struct ReportContext<'a> {
    title: &'a str,
    description: &'a str,
    entry_type: &'a str,
    mixed_entry_types: bool,
    mac_error: Option<&'a str>,
    settings: Option<SettingsView<'a>>,
    rules: Vec<Section<'a>>,
    groups: Vec<Section<'a>>,
    intune_custom_settings: Vec<IntuneRowView<'a>>,
    support: Vec<SupportView<'a>>,
    groups_xml: &'a str,
    rules_xml: &'a str,
    mac_policy: Option<String>,
    sources: Vec<SourceLink<'a>>,
    result: &'a QueryResult,
}

fn support_view<'a>(label: &'static str, support: &'a Support) -> SupportView<'a> {
    SupportView {
        label,
        supported: support.is_supported(),
        checked: support.checked,
        issues: support.issues.iter().map(String::as_str).collect(),
    }
}

fn intune_value(row: &IntuneCustomRow, dest: &Path) -> String {
    if row.value.is_empty() {
        String::new()
    } else if row.data_type == OmaDataType::XmlFile {
        format!("[{}]({})", row.value, link(&row.value, dest))
    } else {
        row.value.clone()
    }
}

/// Render the Markdown report for `result`. Links are relative to `dest`.
pub fn render_report(
    templates: &Templates,
    result: &QueryResult,
    title: &str,
    description: &str,
    dest: &Path,
) -> Result<String, TemplateError> {
    let mac_policy = result
        .mac_policy
        .as_ref()
        .and_then(|policy| serde_json::to_string_pretty(policy).ok());
    let context = ReportContext {
        title,
        description,
        entry_type: result.entry_type.label(),
        mixed_entry_types: result.mixed_entry_types,
        mac_error: result.mac_error.as_deref(),
        settings: result.settings.as_ref().map(|settings| SettingsView {
            default_enforcement: settings.default_enforcement.label(),
            device_control_enabled: settings.device_control_enabled,
            navigation_target: settings.navigation_target.as_deref(),
        }),
        rules: result
            .rules
            .iter()
            .map(|rule| Section {
                name: &rule.name,
                id: &rule.id,
                anchor: anchor(&rule.name),
                body: render_rule(result, rule),
            })
            .collect(),
        groups: result
            .groups
            .iter()
            .map(|group| Section {
                name: &group.name,
                id: &group.id,
                anchor: anchor(&group.name),
                body: render_group(group),
            })
            .collect(),
        intune_custom_settings: result
            .oma_uri
            .values()
            .map(|row| IntuneRowView {
                name: &row.name,
                description: &row.description,
                oma_uri: &row.oma_uri,
                data_type: row.data_type.to_string(),
                value: intune_value(row, dest),
            })
            .collect(),
        support: vec![
            support_view("Intune UX", &result.intune_ux_support),
            support_view("Windows", &result.windows_support),
        ],
        groups_xml: &result.groups_xml,
        rules_xml: &result.rules_xml,
        mac_policy,
        sources: result
            .paths
            .iter()
            .map(|path| SourceLink {
                path,
                link: link(path, dest),
            })
            .collect(),
        result,
    };
    templates.render_report(context)
}

/// One generated report listed in the README.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadmeEntry {
    pub title: String,
    pub file: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct ReadmeContext<'a> {
    title: &'a str,
    entries: &'a [ReadmeEntry],
}

pub fn render_readme(templates: &Templates, title: &str, entries: &[ReadmeEntry]) -> Result<String, TemplateError> {
    templates.render_readme(ReadmeContext { title, entries })
}

/// Write `contents` to `dest/file`, or to `file` when it is absolute.
pub fn write_document(dest: &Path, file: &str, contents: &str) -> io::Result<PathBuf> {
    let path = if Path::new(file).is_absolute() {
        PathBuf::from(file)
    } else {
        dest.join(file)
    };
    fs::write(&path, contents)?;
    info!(event = "Report", path = %path.display(), "generated documentation");
    Ok(path)
}

/// Write the GPO and macOS documents of `result` named after `stem`.
/// Failures are logged; returns the files written.
pub fn write_generated(result: &QueryResult, stem: &str, targets: &GenerateTargets) -> Vec<PathBuf> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    if let Some(dir) = &targets.gpo {
        files.push((dir.join(format!("{stem}_groups.xml")), result.groups_xml.clone()));
        files.push((dir.join(format!("{stem}_rules.xml")), result.rules_xml.clone()));
    }
    if let (Some(dir), Some(policy)) = (&targets.mac, &result.mac_policy) {
        match serde_json::to_string_pretty(policy) {
            Ok(text) => files.push((dir.join(format!("{stem}.json")), text)),
            Err(err) => error!(event = "Generate", error = %err, "failed to serialize mac policy"),
        }
    }

    let mut written = Vec::new();
    for (path, contents) in files {
        match fs::write(&path, contents) {
            Ok(()) => {
                info!(event = "Generate", path = %path.display(), "generated file");
                written.push(path);
            }
            Err(err) => error!(event = "Generate", path = %path.display(), error = %err, "failed to write"),
        }
    }
    written
}

/// One-line terminal summary of a generated report.
pub fn render_summary(title: &str, result: &QueryResult, path: &Path) -> String {
    let line = format!(
        "{title}: {} rules, {} groups, {} -> {}",
        result.rules.len(),
        result.groups.len(),
        result.entry_type.label(),
        path.display()
    );
    match &result.mac_error {
        Some(err) => format!("{}\n  {}", line.yellow(), format!("macOS: {err}").yellow()),
        None => line.cyan().to_string(),
    }
}
