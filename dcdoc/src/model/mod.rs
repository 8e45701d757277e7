//! Format-agnostic device-control policy model.
//!
//! Groups and rules reference each other by id only; resolution happens in
//! the [`crate::inventory`].

pub mod clause;
pub mod entry;
pub mod group;
pub mod parameters;
pub mod rule;
pub mod settings;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;

pub use clause::Clause;
pub use entry::{AccessType, Enforcement, Entry, EntryType, NotificationBit};
pub use group::{Group, GroupProperty, GroupType, UNNAMED};
pub use parameters::{Condition, ConditionKind, ParameterNode, Parameters};
pub use rule::PolicyRule;
pub use settings::{DefaultEnforcement, Settings};

/// Base of every device-control OMA-URI.
pub const OMA_URI_ROOT: &str = "./Vendor/MSFT/Defender/Configuration";

/// Source or target representation of a policy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Format {
    #[serde(rename = "gpo")]
    Gpo,
    #[serde(rename = "oma-uri")]
    OmaUri,
    #[serde(rename = "mac")]
    Mac,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Gpo, Format::OmaUri, Format::Mac];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Gpo => "gpo",
            Format::OmaUri => "oma-uri",
            Format::Mac => "mac",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "gpo" => Ok(Format::Gpo),
            "oma-uri" => Ok(Format::OmaUri),
            "mac" => Ok(Format::Mac),
            other => Err(ConfigError::InvalidFormat(other.to_string())),
        }
    }
}

/// A single match criterion: a Windows descriptor tag or a macOS clause leaf.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Canonical `name=value` form used for hashing and equality.
    pub fn encoding(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}
