//! Rows of an Intune custom configuration profile.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::model::{Group, PolicyRule};
use crate::naming::web_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OmaDataType {
    Integer,
    String,
    #[serde(rename = "String (XML File)")]
    XmlFile,
}

impl Display for OmaDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OmaDataType::Integer => "Integer",
            OmaDataType::String => "String",
            OmaDataType::XmlFile => "String (XML File)",
        })
    }
}

/// One custom OMA-URI setting as entered in the Intune portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntuneCustomRow {
    pub name: String,
    pub description: String,
    pub oma_uri: String,
    pub data_type: OmaDataType,
    pub value: String,
}

/// Objects that can be deployed as one Intune custom setting.
pub trait OmaUriRow {
    fn to_oma_uri_row(&self) -> IntuneCustomRow;
}

impl OmaUriRow for Group {
    fn to_oma_uri_row(&self) -> IntuneCustomRow {
        IntuneCustomRow {
            name: self.name.clone(),
            description: self.group_type.label().to_string(),
            oma_uri: self.oma_uri(),
            data_type: OmaDataType::XmlFile,
            value: self.path.as_deref().map(web_path).unwrap_or_default(),
        }
    }
}

impl OmaUriRow for PolicyRule {
    fn to_oma_uri_row(&self) -> IntuneCustomRow {
        IntuneCustomRow {
            name: self.name.clone(),
            description: self.entry_type().label().to_string(),
            oma_uri: self.oma_uri(),
            data_type: OmaDataType::XmlFile,
            value: self.path.as_deref().map(web_path).unwrap_or_default(),
        }
    }
}
