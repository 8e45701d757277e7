//! Error kinds for each processing boundary.
//!
//! Parse and conversion errors are recoverable: the caller logs them and
//! skips the element, file or conversion that failed. Configuration errors
//! stop the run before any input is read.

use std::path::PathBuf;

use thiserror::Error;

/// A source element or document could not be turned into model objects.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Xml(#[from] policy_xml::ParseError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{element} is missing mandatory attribute {attribute}")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("{element} is missing mandatory element <{child}>")]
    MissingElement {
        element: String,
        child: &'static str,
    },
    #[error("invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("unknown enforcement type '{0}'")]
    UnknownEnforcement(String),
    #[error("unknown condition <{0}>")]
    UnknownCondition(String),
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),
    #[error("unknown entry type '{0}'")]
    UnknownEntryType(String),
    #[error("unexpected JSON shape: {0}")]
    Shape(String),
}

/// The Windows documents of a query could not be projected to the macOS format.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to re-read assembled policy XML: {0}")]
    Parse(#[from] ParseError),
    #[error("group {id}: type {group_type} is not supported on macOS")]
    GroupType { id: String, group_type: String },
    #[error("group {id}: descriptor {descriptor} has no macOS equivalent")]
    Descriptor { id: String, descriptor: String },
    #[error("group {id}: match type {match_type} has no macOS equivalent")]
    MatchType { id: String, match_type: String },
    #[error("rule {rule}, entry {entry}: {reason}")]
    Entry {
        rule: String,
        entry: String,
        reason: String,
    },
}

/// Invalid invocation or configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
    #[error("invalid format '{0}' (expected gpo, oma-uri or mac)")]
    InvalidFormat(String),
    #[error("invalid location to save generated files: {0}")]
    InvalidGenerateLocation(String),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// A report template could not be found, read or rendered.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found in the template path")]
    NotFound(String),
    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("template {name}: {source}")]
    Render {
        name: String,
        source: minijinja::Error,
    },
}

/// A report, README or generated description could not be produced.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Scenarios(#[from] ParseError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
