//! Name and value correspondence between macOS clauses and Windows descriptors.
//!
//! The tables ship as `mappings/mac.toml`. A run may install a replacement
//! table once, before any conversion happens; every later lookup reads the
//! installed table.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Windows descriptor that combines `vendorId` and `productId`.
pub const VID_PID: &str = "VID_PID";
pub const VENDOR_ID: &str = "vendorId";
pub const PRODUCT_ID: &str = "productId";
pub const PRIMARY_ID: &str = "PrimaryId";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamePair {
    pub mac: String,
    pub windows: String,
}

impl NamePair {
    fn new(mac: &str, windows: &str) -> Self {
        Self {
            mac: mac.to_string(),
            windows: windows.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MacMappings {
    #[serde(default)]
    pub descriptor: Vec<NamePair>,
    #[serde(default)]
    pub primary_id: Vec<NamePair>,
    #[serde(default)]
    pub match_type: Vec<NamePair>,
}

/// Errors returned when loading mapping files.
#[derive(Debug, Error)]
pub enum MappingLoadError {
    #[error("failed to read mappings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse mappings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl MacMappings {
    pub fn windows_descriptor(&self, mac: &str) -> Option<&str> {
        find_windows(&self.descriptor, mac)
    }

    /// macOS property names for a Windows descriptor (two for `VID_PID`).
    pub fn mac_descriptors(&self, windows: &str) -> Vec<&str> {
        self.descriptor
            .iter()
            .filter(|pair| pair.windows == windows)
            .map(|pair| pair.mac.as_str())
            .collect()
    }

    pub fn windows_primary_id<'a>(&'a self, mac: &'a str) -> &'a str {
        find_windows(&self.primary_id, mac).unwrap_or(mac)
    }

    pub fn mac_primary_id<'a>(&'a self, windows: &'a str) -> &'a str {
        find_mac(&self.primary_id, windows).unwrap_or(windows)
    }

    pub fn windows_match_type(&self, operator: &str) -> Option<&str> {
        find_windows(&self.match_type, operator)
    }

    pub fn mac_match_type(&self, windows: &str) -> Option<&str> {
        find_mac(&self.match_type, windows)
    }
}

fn find_windows<'a>(pairs: &'a [NamePair], mac: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|pair| pair.mac == mac)
        .map(|pair| pair.windows.as_str())
}

fn find_mac<'a>(pairs: &'a [NamePair], windows: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|pair| pair.windows == windows)
        .map(|pair| pair.mac.as_str())
}

/// Load mac mappings from a TOML file.
pub fn load_mac_mappings(path: &Path) -> Result<MacMappings, MappingLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MappingLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_mappings(&raw, path.display().to_string())
}

/// Built-in mappings.
pub fn default_mac_mappings() -> MacMappings {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/mappings/mac.toml"));
    match parse_mappings(embedded, "embedded mappings".to_string()) {
        Ok(mappings) if !mappings.descriptor.is_empty() => mappings,
        _ => fallback_mac_mappings(),
    }
}

fn parse_mappings(raw: &str, path: String) -> Result<MacMappings, MappingLoadError> {
    toml::from_str(raw).map_err(|source| MappingLoadError::Parse { path, source })
}

fn fallback_mac_mappings() -> MacMappings {
    MacMappings {
        descriptor: vec![
            NamePair::new("primaryId", PRIMARY_ID),
            NamePair::new("serialNumber", "SerialNumberId"),
            NamePair::new(VENDOR_ID, VID_PID),
            NamePair::new(PRODUCT_ID, VID_PID),
        ],
        primary_id: vec![
            NamePair::new("removable_media_devices", "RemovableMediaDevices"),
            NamePair::new("portable_devices", "WpdDevices"),
        ],
        match_type: vec![
            NamePair::new("and", "MatchAll"),
            NamePair::new("or", "MatchAny"),
            NamePair::new("not", "MatchExcludeAny"),
        ],
    }
}

static MAPPINGS: OnceLock<MacMappings> = OnceLock::new();

/// Install the table used for the rest of the run.
///
/// With `path`, the file replaces the built-in table; a file that fails to
/// load is reported and the built-in table is used. Only the first call
/// has an effect.
pub fn install(path: Option<&Path>) {
    let mappings = match path {
        Some(path) => match load_mac_mappings(path) {
            Ok(mappings) => mappings,
            Err(err) => {
                warn!(event = "Mappings", error = %err, "using built-in mac mappings");
                default_mac_mappings()
            }
        },
        None => default_mac_mappings(),
    };
    if MAPPINGS.set(mappings).is_err() {
        warn!(event = "Mappings", "mac mappings already installed");
    }
}

/// The active mapping table.
pub fn mappings() -> &'static MacMappings {
    MAPPINGS.get_or_init(default_mac_mappings)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{default_mac_mappings, fallback_mac_mappings, load_mac_mappings, MappingLoadError};

    #[test]
    fn embedded_table_matches_compiled_fallback() {
        assert_eq!(default_mac_mappings(), fallback_mac_mappings());
    }

    #[test]
    fn lookups_work_both_ways() {
        let mappings = default_mac_mappings();
        assert_eq!(mappings.windows_descriptor("serialNumber"), Some("SerialNumberId"));
        assert_eq!(mappings.mac_descriptors("VID_PID"), vec!["vendorId", "productId"]);
        assert_eq!(mappings.windows_primary_id("portable_devices"), "WpdDevices");
        assert_eq!(mappings.mac_primary_id("RemovableMediaDevices"), "removable_media_devices");
        assert_eq!(mappings.mac_primary_id("CdRomDevices"), "CdRomDevices");
        assert_eq!(mappings.windows_match_type("not"), Some("MatchExcludeAny"));
        assert_eq!(mappings.mac_match_type("MatchExcludeAll"), None);
    }

    #[test]
    fn broken_file_is_a_parse_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("mac.toml");
        fs::write(&path, "[[descriptor]\nmac=").expect("write");
        assert!(matches!(
            load_mac_mappings(&path),
            Err(MappingLoadError::Parse { .. })
        ));
    }

    #[test]
    fn override_file_replaces_tables() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("mac.toml");
        fs::write(
            &path,
            "[[descriptor]]\nmac = \"serialNumber\"\nwindows = \"SerialNumberId\"\n",
        )
        .expect("write");
        let mappings = load_mac_mappings(&path).expect("load");
        assert_eq!(mappings.descriptor.len(), 1);
        assert!(mappings.match_type.is_empty());
    }
}
