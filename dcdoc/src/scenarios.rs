//! Report jobs: a single input file, a free query, or a scenarios file that
//! expands to one job per listed policy plus a README.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::error::{ParseError, ReportError};
use crate::inventory::{Inventory, QueryResult, RuleQuery};
use crate::model::Settings;
use crate::naming::file_stem;
use crate::parse::{read_json, SourceKind};
use crate::report::{self, ReadmeEntry};
use crate::templates::Templates;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioFile {
    pub title: String,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// Policy file, relative to the scenarios file.
    pub file: PathBuf,
    pub title: Option<String>,
    pub description: Option<String>,
    pub settings: Option<Value>,
}

pub fn load_scenarios(path: &Path) -> Result<ScenarioFile, ParseError> {
    Ok(serde_json::from_value(read_json(path)?)?)
}

/// One report to produce.
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub query: RuleQuery,
    pub title: String,
    pub description: Option<String>,
    pub settings: Option<Settings>,
    pub out_file: String,
    /// Base name of generated GPO and macOS files.
    pub stem: String,
}

impl ReportJob {
    /// Job for `path == <file>`, titled after the file. A macOS policy
    /// contributes its own settings.
    pub fn for_input(path: &Path) -> Self {
        let stem = file_stem(path);
        Self {
            query: RuleQuery::PathEquals(path.to_path_buf()),
            title: stem.clone(),
            description: None,
            settings: Some(settings_for_input(path)),
            out_file: format!("{stem}.md"),
            stem,
        }
    }

    pub fn for_query(query: &str, title: Option<String>, out_file: Option<String>) -> Self {
        Self {
            query: RuleQuery::parse(query),
            title: title.unwrap_or_else(|| "Device Control Policy".to_string()),
            description: None,
            settings: None,
            out_file: out_file.unwrap_or_else(|| "dcdoc.md".to_string()),
            stem: "dcdoc".to_string(),
        }
    }
}

fn settings_for_input(path: &Path) -> Settings {
    if SourceKind::from_path(path) != Some(SourceKind::Json) {
        return Settings::default();
    }
    let settings = read_json(path).and_then(|policy| match policy.get("settings") {
        Some(value) => Settings::from_mac_json(value),
        None => Ok(Settings::default()),
    });
    settings.unwrap_or_else(|err| {
        warn!(event = "Scenario", path = %path.display(), error = %err, "using default settings");
        Settings::default()
    })
}

/// A report that was written.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub title: String,
    pub path: PathBuf,
    pub description: String,
    pub result: QueryResult,
}

/// Query, render and write one report, plus any generated GPO/macOS files.
pub fn run_job(
    inventory: &Inventory,
    job: &ReportJob,
    config: &RunConfig,
    templates: &Templates,
) -> Result<GeneratedReport, ReportError> {
    debug!(event = "Report", query = %job.query, title = %job.title, "running job");
    let mut result = inventory.run_query(&job.query);
    if let Some(settings) = &job.settings {
        result.apply_settings(settings);
    }
    let description = match &job.description {
        Some(description) => description.clone(),
        None => report::describe(templates, &result)?,
    };
    let text = report::render_report(templates, &result, &job.title, &description, &config.dest)?;
    let path = write(&config.dest, &job.out_file, &text)?;
    report::write_generated(&result, &job.stem, &config.generate);
    Ok(GeneratedReport {
        title: job.title.clone(),
        path,
        description,
        result,
    })
}

fn write(dest: &Path, file: &str, contents: &str) -> Result<PathBuf, ReportError> {
    report::write_document(dest, file, contents).map_err(|source| ReportError::Io {
        path: dest.join(file).display().to_string(),
        source,
    })
}

/// Locate a scenario's policy under one of the source directories.
///
/// Returns the path as the inventory knows it (source directory joined with
/// the relative part), or `None` when the file does not exist or lies
/// outside every source.
pub fn resolve_policy_file(scenarios_dir: &Path, file: &Path, sources: &[PathBuf]) -> Option<PathBuf> {
    let candidate = fs::canonicalize(scenarios_dir.join(file)).ok()?;
    if !candidate.is_file() {
        return None;
    }
    sources.iter().find_map(|source| {
        let root = fs::canonicalize(source).ok()?;
        let relative = candidate.strip_prefix(&root).ok()?;
        debug!(event = "Scenario", path = %candidate.display(), source = %source.display(), "found policy");
        Some(source.join(relative))
    })
}

fn job_for_scenario(scenario: &Scenario, policy: &Path) -> ReportJob {
    let mut job = ReportJob::for_input(policy);
    if let Some(title) = &scenario.title {
        job.title = title.clone();
    }
    job.description = scenario.description.clone();
    if let Some(value) = &scenario.settings {
        match Settings::from_scenario_json(value) {
            Ok(settings) => job.settings = Some(settings),
            Err(err) => warn!(event = "Scenario", file = %scenario.file.display(), error = %err, "ignoring scenario settings"),
        }
    }
    job
}

/// Produce one report per usable scenario and the README listing them.
///
/// Scenarios whose policy is missing or outside the sources are skipped with
/// a warning. Returns the reports written and the README path.
pub fn run_scenarios(
    inventory: &Inventory,
    scenarios_path: &Path,
    config: &RunConfig,
    templates: &Templates,
) -> Result<(Vec<GeneratedReport>, PathBuf), ReportError> {
    let scenarios = load_scenarios(scenarios_path)?;
    let scenarios_dir = scenarios_path.parent().unwrap_or_else(|| Path::new("."));

    let mut reports = Vec::new();
    for scenario in &scenarios.scenarios {
        let Some(policy) = resolve_policy_file(scenarios_dir, &scenario.file, &config.paths) else {
            warn!(
                event = "Scenario",
                file = %scenario.file.display(),
                "policy file not found under the source paths, skipping"
            );
            continue;
        };
        let job = job_for_scenario(scenario, &policy);
        match run_job(inventory, &job, config, templates) {
            Ok(generated) => reports.push(generated),
            Err(err) => warn!(event = "Scenario", file = %scenario.file.display(), error = %err, "failed to write report"),
        }
    }

    let entries: Vec<ReadmeEntry> = reports
        .iter()
        .map(|generated| ReadmeEntry {
            title: generated.title.clone(),
            file: generated
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            description: generated.description.clone(),
        })
        .collect();
    let readme = report::render_readme(templates, &scenarios.title, &entries)?;
    let readme_path = write(&config.dest, &config.readme, &readme)?;
    Ok((reports, readme_path))
}
