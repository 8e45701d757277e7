//! Run configuration.
//!
//! Built-in defaults are overridden by an optional TOML file, which is
//! overridden by command-line flags. Everything is validated before any
//! source file is read.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::Format;
use crate::templates::TemplateNames;

pub const DEFAULT_README: &str = "readme.md";

/// Directories that receive generated documents, per target format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateTargets {
    pub gpo: Option<PathBuf>,
    pub oma_uri: Option<PathBuf>,
    pub mac: Option<PathBuf>,
}

impl GenerateTargets {
    /// Read `fmt:dir[,fmt:dir...]`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut targets = GenerateTargets::default();
        for token in text.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            let (format, dir) = token.split_once(':').unwrap_or((token, ""));
            targets.set(format.parse()?, PathBuf::from(dir))?;
        }
        Ok(targets)
    }

    pub fn set(&mut self, format: Format, dir: PathBuf) -> Result<(), ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::InvalidGenerateLocation(dir.display().to_string()));
        }
        match format {
            Format::Gpo => self.gpo = Some(dir),
            Format::OmaUri => self.oma_uri = Some(dir),
            Format::Mac => self.mac = Some(dir),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.gpo.is_none() && self.oma_uri.is_none() && self.mac.is_none()
    }
}

/// Source directories from a platform path list (`:` or `;` separated).
pub fn parse_path_list(text: &str) -> Result<Vec<PathBuf>, ConfigError> {
    env::split_paths(text).map(existing_dir).collect()
}

fn existing_dir(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfigError::NotADirectory(path))
    }
}

/// Contents of a `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub paths: Option<Vec<PathBuf>>,
    pub dest: Option<PathBuf>,
    #[serde(default)]
    pub generate: BTreeMap<String, PathBuf>,
    pub mappings: Option<PathBuf>,
    pub readme: Option<String>,
    pub title: Option<String>,
    pub templates_path: Option<Vec<PathBuf>>,
    pub template: Option<String>,
    pub readme_template: Option<String>,
    pub description_template: Option<String>,
}

impl FileConfig {
    /// Resolve relative paths against `base`.
    fn rebase(mut self, base: &Path) -> Self {
        let join = |path: PathBuf| if path.is_absolute() { path } else { base.join(path) };
        self.paths = self.paths.map(|paths| paths.into_iter().map(join).collect());
        self.dest = self.dest.map(join);
        self.generate = self
            .generate
            .into_iter()
            .map(|(format, dir)| (format, join(dir)))
            .collect();
        self.mappings = self.mappings.map(join);
        self.templates_path = self
            .templates_path
            .map(|dirs| dirs.into_iter().map(join).collect());
        self
    }
}

/// Load a config file; relative paths in it are relative to the file.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.rebase(base))
}

/// Values given on the command line; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub paths: Option<String>,
    pub dest: Option<PathBuf>,
    pub generate: Option<String>,
    pub readme: Option<String>,
    pub title: Option<String>,
    pub templates_path: Option<String>,
    pub template: Option<String>,
    pub readme_template: Option<String>,
    pub description_template: Option<String>,
}

/// Fully resolved and validated settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub paths: Vec<PathBuf>,
    pub dest: PathBuf,
    pub generate: GenerateTargets,
    pub mappings: Option<PathBuf>,
    pub readme: String,
    pub title: Option<String>,
    /// Directories searched for templates before the built-in ones.
    pub templates_path: Vec<PathBuf>,
    pub templates: TemplateNames,
}

impl RunConfig {
    pub fn resolve(file: Option<FileConfig>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let paths = match overrides.paths {
            Some(list) => parse_path_list(&list)?,
            None => file
                .paths
                .unwrap_or_else(|| vec![PathBuf::from(".")])
                .into_iter()
                .map(existing_dir)
                .collect::<Result<_, _>>()?,
        };

        let dest = existing_dir(
            overrides
                .dest
                .or(file.dest)
                .unwrap_or_else(|| PathBuf::from(".")),
        )?;

        let generate = match overrides.generate {
            Some(text) => GenerateTargets::parse(&text)?,
            None => {
                let mut targets = GenerateTargets::default();
                for (format, dir) in file.generate {
                    targets.set(format.parse()?, dir)?;
                }
                targets
            }
        };

        if let Some(mappings) = &file.mappings {
            if !mappings.is_file() {
                return Err(ConfigError::NotAFile(mappings.clone()));
            }
        }

        let templates_path = match overrides.templates_path {
            Some(list) => parse_path_list(&list)?,
            None => file
                .templates_path
                .unwrap_or_default()
                .into_iter()
                .map(existing_dir)
                .collect::<Result<_, _>>()?,
        };
        let defaults = TemplateNames::default();
        let templates = TemplateNames {
            report: overrides.template.or(file.template).unwrap_or(defaults.report),
            readme: overrides
                .readme_template
                .or(file.readme_template)
                .unwrap_or(defaults.readme),
            description: overrides
                .description_template
                .or(file.description_template)
                .unwrap_or(defaults.description),
        };

        Ok(Self {
            paths,
            dest,
            generate,
            mappings: file.mappings,
            readme: overrides
                .readme
                .or(file.readme)
                .unwrap_or_else(|| DEFAULT_README.to_string()),
            title: overrides.title.or(file.title),
            templates_path,
            templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::{load_config, GenerateTargets, Overrides, RunConfig};
    use crate::error::ConfigError;
    use crate::templates::TemplateNames;

    #[test]
    fn generate_targets_require_known_formats_and_directories() {
        let dir = tempdir().expect("tempdir");
        let text = format!("gpo:{0},mac:{0}", dir.path().display());
        let targets = GenerateTargets::parse(&text).expect("valid");
        assert_eq!(targets.gpo.as_deref(), Some(dir.path()));
        assert_eq!(targets.mac.as_deref(), Some(dir.path()));
        assert!(targets.oma_uri.is_none());

        assert!(matches!(
            GenerateTargets::parse(&format!("pdf:{}", dir.path().display())),
            Err(ConfigError::InvalidFormat(format)) if format == "pdf"
        ));
        assert!(matches!(
            GenerateTargets::parse("gpo:/nonexistent/dcdoc"),
            Err(ConfigError::InvalidGenerateLocation(_))
        ));
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("src")).expect("mkdir");
        fs::create_dir(dir.path().join("out")).expect("mkdir");
        let config_path = dir.path().join("dcdoc.toml");
        fs::write(
            &config_path,
            "paths = [\"src\"]\ndest = \"out\"\nreadme = \"index.md\"\n\n[generate]\n\"oma-uri\" = \"out\"\n",
        )
        .expect("write");

        let file = load_config(&config_path).expect("config");
        let resolved = RunConfig::resolve(
            Some(file.clone()),
            Overrides {
                readme: Some("other.md".into()),
                ..Overrides::default()
            },
        )
        .expect("resolved");
        assert_eq!(resolved.paths, vec![dir.path().join("src")]);
        assert_eq!(resolved.dest, dir.path().join("out"));
        assert_eq!(resolved.generate.oma_uri, Some(dir.path().join("out")));
        assert_eq!(resolved.readme, "other.md");

        let defaults = RunConfig::resolve(None, Overrides::default()).expect("defaults");
        assert_eq!(defaults.paths, vec![PathBuf::from(".")]);
        assert_eq!(defaults.readme, "readme.md");
        assert!(defaults.templates_path.is_empty());
        assert_eq!(defaults.templates, TemplateNames::default());
    }

    #[test]
    fn template_settings_layer_like_the_rest() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("tpl")).expect("mkdir");
        let config_path = dir.path().join("dcdoc.toml");
        fs::write(
            &config_path,
            "templates_path = [\"tpl\"]\ntemplate = \"file.md.j2\"\nreadme_template = \"index.md.j2\"\n",
        )
        .expect("write");

        let file = load_config(&config_path).expect("config");
        let resolved = RunConfig::resolve(
            Some(file),
            Overrides {
                template: Some("flag.md.j2".into()),
                ..Overrides::default()
            },
        )
        .expect("resolved");
        assert_eq!(resolved.templates_path, vec![dir.path().join("tpl")]);
        assert_eq!(resolved.templates.report, "flag.md.j2");
        assert_eq!(resolved.templates.readme, "index.md.j2");
        assert_eq!(resolved.templates.description, "description.md.j2");

        assert!(matches!(
            RunConfig::resolve(
                None,
                Overrides {
                    templates_path: Some(dir.path().join("missing").display().to_string()),
                    ..Overrides::default()
                }
            ),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn invalid_files_are_config_errors() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "colour = \"blue\"\n").expect("write");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml { .. })));
        assert!(matches!(
            load_config(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
        assert!(matches!(
            RunConfig::resolve(
                None,
                Overrides {
                    dest: Some(dir.path().join("nope")),
                    ..Overrides::default()
                }
            ),
            Err(ConfigError::NotADirectory(_))
        ));
    }
}
