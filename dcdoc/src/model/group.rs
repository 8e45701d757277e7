use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use policy_xml::{close_tag, comment, open_tag, text_element};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ConversionError;
use crate::mac_mappings::{self, PRIMARY_ID, PRODUCT_ID, VENDOR_ID, VID_PID};
use crate::mac_convert;
use crate::model::{Clause, Format, Property, OMA_URI_ROOT};
use crate::naming::quote_plus;

/// Placeholder name of a group that has no `<Name>` / `name`.
pub const UNNAMED: &str = "?";

/// Kind of thing a group matches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum GroupType {
    Device,
    PrinterDevice,
    PrintJob,
    File,
    Network,
    VPNConnection,
    MacDevice,
    Other(String),
}

impl GroupType {
    pub fn from_windows(raw: &str) -> Self {
        match raw.trim() {
            "" | "Device" => GroupType::Device,
            "PrinterDevice" => GroupType::PrinterDevice,
            "PrintJob" => GroupType::PrintJob,
            "File" => GroupType::File,
            "Network" => GroupType::Network,
            "VPNConnection" => GroupType::VPNConnection,
            other => GroupType::Other(other.to_string()),
        }
    }

    pub fn from_mac(raw: &str) -> Self {
        match raw.trim() {
            "" | "device" => GroupType::MacDevice,
            other => GroupType::Other(other.to_string()),
        }
    }

    /// Token as written in the source document.
    pub fn as_str(&self) -> &str {
        match self {
            GroupType::Device => "Device",
            GroupType::PrinterDevice => "PrinterDevice",
            GroupType::PrintJob => "PrintJob",
            GroupType::File => "File",
            GroupType::Network => "Network",
            GroupType::VPNConnection => "VPNConnection",
            GroupType::MacDevice => "device",
            GroupType::Other(raw) => raw,
        }
    }

    /// `Type` attribute used when the group is written as Windows XML.
    pub fn windows_type(&self) -> &str {
        match self {
            GroupType::MacDevice => "Device",
            other => other.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            GroupType::Device => "Windows Device",
            GroupType::PrinterDevice => "Windows Printer Device",
            GroupType::PrintJob => "Windows Print Job",
            GroupType::File => "Windows File",
            GroupType::Network => "Windows Network",
            GroupType::VPNConnection => "Windows VPN Connection",
            GroupType::MacDevice => "Mac Device",
            GroupType::Other(raw) => raw,
        }
    }

    /// Known property names of this type with their display labels.
    pub fn property_labels(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            GroupType::Device => &[
                ("PrimaryId", "Primary Id"),
                ("DeviceId", "Device Id"),
                ("HardwareId", "Hardware Id"),
                ("InstancePathId", "Instance Path Id"),
                ("FriendlyNameId", "Friendly Name"),
                ("SerialNumberId", "Serial Number"),
                ("VID_PID", "Vendor/Product Id"),
                ("BusId", "Bus Id"),
            ],
            GroupType::PrinterDevice => &[
                ("PrimaryId", "Primary Id"),
                ("FriendlyNameId", "Friendly Name"),
                ("PrinterConnectionId", "Printer Connection"),
                ("VID_PID", "Vendor/Product Id"),
            ],
            GroupType::PrintJob => &[
                ("PrintOutputFileNameId", "Output File Name"),
                ("PrintDocumentNameId", "Document Name"),
            ],
            GroupType::File => &[("PathId", "Path")],
            GroupType::Network => &[
                ("NameId", "Network Name"),
                ("NetworkCategoryId", "Network Category"),
                ("NetworkDomainId", "Network Domain"),
            ],
            GroupType::VPNConnection => &[
                ("NameId", "VPN Name"),
                ("VPNServerAddressId", "Server Address"),
                ("VPNDnsSuffixId", "DNS Suffix"),
                ("VPNConnectionStatusId", "Connection Status"),
            ],
            GroupType::MacDevice => &[
                ("primaryId", "Primary Id"),
                ("vendorId", "Vendor Id"),
                ("productId", "Product Id"),
                ("serialNumber", "Serial Number"),
                ("encryption", "Encryption"),
                ("groupId", "Group Id"),
            ],
            GroupType::Other(_) => &[],
        }
    }

    pub fn property_label<'a>(&self, name: &'a str) -> &'a str {
        self.property_labels()
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, label)| *label)
            .unwrap_or(name)
    }
}

impl Display for GroupType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GroupProperty {
    Descriptor(Property),
    Clause(Clause),
}

impl GroupProperty {
    pub fn encoding(&self) -> String {
        match self {
            GroupProperty::Descriptor(property) => property.encoding(),
            GroupProperty::Clause(clause) => clause.encoding(),
        }
    }
}

/// A named set of match criteria that rules reference by id.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub group_type: GroupType,
    pub match_type: String,
    pub format: Format,
    /// Format the group was read from. Copies keep it, except the OMA-URI
    /// projection of a macOS group, which is a Windows group.
    pub origin: Format,
    pub path: Option<PathBuf>,
    pub properties: Vec<GroupProperty>,
}

impl Group {
    pub fn new(id: impl Into<String>, format: Format) -> Self {
        let (group_type, match_type) = match format {
            Format::Mac => (GroupType::MacDevice, "or"),
            Format::Gpo | Format::OmaUri => (GroupType::Device, "MatchAny"),
        };
        Self {
            id: id.into(),
            name: UNNAMED.to_string(),
            group_type,
            match_type: match_type.to_string(),
            format,
            origin: format,
            path: None,
            properties: Vec::new(),
        }
    }

    pub fn is_unnamed(&self) -> bool {
        self.name == UNNAMED
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter_map(|property| match property {
            GroupProperty::Descriptor(property) => Some(property),
            GroupProperty::Clause(_) => None,
        })
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.properties.iter().filter_map(|property| match property {
            GroupProperty::Clause(clause) => Some(clause),
            GroupProperty::Descriptor(_) => None,
        })
    }

    /// Reassemble the macOS query: match type as operator, descriptors as
    /// leaves and clause properties as sub-clauses.
    pub fn root_clause(&self) -> Clause {
        let mut root = Clause::new(self.match_type.clone());
        root.properties = self.descriptors().cloned().collect();
        root.sub_clauses = self.clauses().cloned().collect();
        root
    }

    /// Property encodings as a set; duplicates and order do not matter.
    pub fn encoding_set(&self) -> BTreeSet<String> {
        self.properties.iter().map(GroupProperty::encoding).collect()
    }

    pub fn oma_uri(&self) -> String {
        format!(
            "{OMA_URI_ROOT}/DeviceControl/PolicyGroups/{}/GroupData",
            quote_plus(&self.id)
        )
    }

    /// Windows XML. A macOS group is written as its [`Group::to_windows`]
    /// form with a comment per property that has no Windows descriptor.
    pub fn to_xml(&self, indent: &str) -> String {
        match self.origin {
            Format::Mac => {
                let (windows, notes) = self.to_windows(Format::Gpo);
                windows.windows_xml(indent, &notes)
            }
            Format::Gpo | Format::OmaUri => self.windows_xml(indent, &[]),
        }
    }

    fn windows_xml(&self, indent: &str, notes: &[String]) -> String {
        let inner = format!("{indent}\t");
        let props = format!("{inner}\t");
        let mut out = open_tag(
            indent,
            "Group",
            &[("Id", &self.id), ("Type", self.group_type.windows_type())],
        );
        out.push_str(&comment(&inner, &self.oma_uri()));
        out.push_str(&text_element(&inner, "Name", &self.name));
        out.push_str(&text_element(&inner, "MatchType", &self.match_type));
        out.push_str(&open_tag(&inner, "DescriptorIdList", &[]));
        for property in self.descriptors() {
            out.push_str(&text_element(&props, &property.name, &property.value));
        }
        for note in notes {
            out.push_str(&comment(&props, note));
        }
        out.push_str(&close_tag(&inner, "DescriptorIdList"));
        out.push_str(&close_tag(indent, "Group"));
        out
    }

    /// The Windows group a macOS group maps to, read as `format` (never
    /// [`Format::Mac`]). Match type, primary ids and descriptor names go
    /// through the mappings; `vendorId`/`productId` merge into one `VID_PID`.
    /// Properties with no Windows descriptor are dropped and described in
    /// the returned notes.
    pub fn to_windows(&self, format: Format) -> (Group, Vec<String>) {
        let mappings = mac_mappings::mappings();
        let vendor = self.descriptors().find(|p| p.name == VENDOR_ID).map(|p| p.value.as_str());
        let product = self.descriptors().find(|p| p.name == PRODUCT_ID).map(|p| p.value.as_str());
        let mut properties = Vec::new();
        let mut notes = Vec::new();
        let mut vid_pid_written = false;

        for property in self.descriptors() {
            match mappings.windows_descriptor(&property.name) {
                Some(VID_PID) => {
                    if !vid_pid_written {
                        let value = format!("{}_{}", vendor.unwrap_or("*"), product.unwrap_or("*"));
                        properties.push(GroupProperty::Descriptor(Property::new(VID_PID, value)));
                        vid_pid_written = true;
                    }
                }
                Some(PRIMARY_ID) => properties.push(GroupProperty::Descriptor(Property::new(
                    PRIMARY_ID,
                    mappings.windows_primary_id(&property.value),
                ))),
                Some(tag) => properties.push(GroupProperty::Descriptor(Property::new(
                    tag,
                    property.value.as_str(),
                ))),
                None => notes.push(format!("{} has no Windows descriptor", property.encoding())),
            }
        }
        for clause in self.clauses() {
            notes.push(format!("nested clause {} has no Windows descriptor", clause.encoding()));
        }

        let group = Group {
            id: self.id.clone(),
            name: self.name.clone(),
            group_type: GroupType::from_windows(self.group_type.windows_type()),
            match_type: mappings
                .windows_match_type(&self.match_type)
                .unwrap_or(self.match_type.as_str())
                .to_string(),
            format,
            origin: format,
            path: None,
            properties,
        };
        (group, notes)
    }

    /// macOS JSON of this group; Windows groups go through [`mac_convert`].
    pub fn to_mac_json(&self) -> Result<Value, ConversionError> {
        match self.origin {
            Format::Mac => Ok(json!({
                "$type": self.group_type.as_str(),
                "id": self.id,
                "name": self.name,
                "query": self.root_clause().to_mac_json(),
            })),
            Format::Gpo | Format::OmaUri => mac_convert::group_to_mac(self),
        }
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.match_type == other.match_type && self.encoding_set() == other.encoding_set()
    }
}

impl Eq for Group {}

impl Hash for Group {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.match_type.hash(state);
        self.encoding_set().hash(state);
    }
}
