//! Source readers: Windows policy XML (GPO and OMA-URI) and macOS JSON.
//!
//! Parsing is best effort per top-level element. An element that fails is
//! logged with its file and skipped; its siblings are still returned.

pub mod mac;
pub mod xml;

use std::fs;
use std::path::Path;

use crate::error::ParseError;
use crate::model::{Group, PolicyRule, Settings};

/// Everything read from one source file, in document order.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub groups: Vec<Group>,
    pub rules: Vec<PolicyRule>,
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Xml,
    Json,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("xml") => Some(SourceKind::Xml),
            Some("json") => Some(SourceKind::Json),
            _ => None,
        }
    }
}

/// Read one policy file. `None` for files that are not policy sources.
pub fn parse_path(path: &Path) -> Option<Result<ParsedFile, ParseError>> {
    let kind = SourceKind::from_path(path)?;
    Some(match kind {
        SourceKind::Xml => policy_xml::parse_file(path)
            .map_err(ParseError::from)
            .and_then(|root| xml::parse_document(&root, path)),
        SourceKind::Json => read_json(path).and_then(|value| mac::parse_document(&value, path)),
    })
}

/// Read and decode a JSON file.
pub fn read_json(path: &Path) -> Result<serde_json::Value, ParseError> {
    let raw = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(raw.trim_start_matches('\u{feff}'))?)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{parse_path, SourceKind};

    #[test]
    fn kind_follows_extension() {
        assert_eq!(SourceKind::from_path(Path::new("a/b.xml")), Some(SourceKind::Xml));
        assert_eq!(SourceKind::from_path(Path::new("b.json")), Some(SourceKind::Json));
        assert_eq!(SourceKind::from_path(Path::new("readme.md")), None);
    }

    #[test]
    fn dispatches_on_extension() {
        let dir = tempdir().expect("tempdir");
        let xml = dir.path().join("g.xml");
        fs::write(&xml, "<Group Id=\"{a}\"><DescriptorIdList><PrimaryId>RemovableMediaDevices</PrimaryId></DescriptorIdList></Group>")
            .expect("write");
        let json = dir.path().join("m.json");
        fs::write(&json, "{\"groups\": [], \"rules\": []}").expect("write");

        let parsed = parse_path(&xml).expect("policy file").expect("parsed");
        assert_eq!(parsed.groups.len(), 1);
        let parsed = parse_path(&json).expect("policy file").expect("parsed");
        assert!(parsed.groups.is_empty());
        assert!(parse_path(&dir.path().join("notes.txt")).is_none());
    }

    #[test]
    fn broken_json_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let json = dir.path().join("m.json");
        fs::write(&json, "{\"groups\": [").expect("write");
        assert!(parse_path(&json).expect("policy file").is_err());
    }
}
