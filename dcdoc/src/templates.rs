//! Jinja templates for reports, the scenario README and generated
//! descriptions.
//!
//! Built-in templates are embedded in the binary. A file with the same name
//! in one of the template directories replaces the built-in one, and other
//! names (including `{% include %}` targets) are looked up in those
//! directories in order.

use std::fs;
use std::path::{Component, Path, PathBuf};

use minijinja::{AutoEscape, Environment, ErrorKind};
use serde::Serialize;
use tracing::debug;

use crate::error::TemplateError;

pub const DEFAULT_REPORT_TEMPLATE: &str = "dcdoc.md.j2";
pub const DEFAULT_README_TEMPLATE: &str = "readme.md.j2";
pub const DEFAULT_DESCRIPTION_TEMPLATE: &str = "description.md.j2";

const BUILTIN: [(&str, &str); 3] = [
    (
        DEFAULT_REPORT_TEMPLATE,
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/dcdoc.md.j2")),
    ),
    (
        DEFAULT_README_TEMPLATE,
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/readme.md.j2")),
    ),
    (
        DEFAULT_DESCRIPTION_TEMPLATE,
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/description.md.j2")),
    ),
];

/// Which template renders each document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNames {
    pub report: String,
    pub readme: String,
    pub description: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            report: DEFAULT_REPORT_TEMPLATE.to_string(),
            readme: DEFAULT_README_TEMPLATE.to_string(),
            description: DEFAULT_DESCRIPTION_TEMPLATE.to_string(),
        }
    }
}

pub struct Templates {
    env: Environment<'static>,
    names: TemplateNames,
}

impl Templates {
    /// The built-in templates only.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::load(&[], TemplateNames::default())
    }

    /// Load `names` from `search_path`, falling back to the built-ins.
    /// A name that is neither found nor built in is an error.
    pub fn load(search_path: &[PathBuf], names: TemplateNames) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for (name, source) in BUILTIN {
            env.add_template(name, source)
                .map_err(|source| TemplateError::Render {
                    name: name.to_string(),
                    source,
                })?;
        }

        for name in [&names.report, &names.readme, &names.description] {
            match find_template(search_path, name) {
                Some(path) => {
                    let source = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                        path: path.display().to_string(),
                        source,
                    })?;
                    debug!(event = "Template", name = %name, path = %path.display(), "using template");
                    env.add_template_owned(name.clone(), source)
                        .map_err(|source| TemplateError::Render {
                            name: name.clone(),
                            source,
                        })?;
                }
                None if BUILTIN.iter().any(|(builtin, _)| *builtin == name.as_str()) => {}
                None => return Err(TemplateError::NotFound(name.clone())),
            }
        }

        let dirs = search_path.to_vec();
        env.set_loader(move |name| read_template(&dirs, name));
        Ok(Self { env, names })
    }

    pub fn render_report<S: Serialize>(&self, context: S) -> Result<String, TemplateError> {
        self.render(&self.names.report, context)
    }

    pub fn render_readme<S: Serialize>(&self, context: S) -> Result<String, TemplateError> {
        self.render(&self.names.readme, context)
    }

    pub fn render_description<S: Serialize>(&self, context: S) -> Result<String, TemplateError> {
        self.render(&self.names.description, context)
    }

    fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, TemplateError> {
        let to_error = |source: minijinja::Error| TemplateError::Render {
            name: name.to_string(),
            source,
        };
        self.env
            .get_template(name)
            .map_err(to_error)?
            .render(context)
            .map_err(to_error)
    }
}

/// First `dir/name` that is a file. Names that leave the directory never match.
fn find_template(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if !relative
        .components()
        .all(|part| matches!(part, Component::Normal(_)))
    {
        return None;
    }
    dirs.iter().map(|dir| dir.join(relative)).find(|path| path.is_file())
}

fn read_template(dirs: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
    let Some(path) = find_template(dirs, name) else {
        return Ok(None);
    };
    fs::read_to_string(&path).map(Some).map_err(|err| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("failed to read template {}", path.display()),
        )
        .with_source(err)
    })
}
