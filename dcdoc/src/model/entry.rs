use std::fmt::{self, Display, Formatter};

use policy_xml::{close_tag, open_tag, text_element};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ParseError;
use crate::model::{Format, Parameters};

const PRINT_MASK: u32 = 0x40;

/// One permission bit (Windows) or access token (macOS) of an entry type.
///
/// `mask` and `token` carry the equivalent in the other family when one
/// exists (`0` / `None` otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessType {
    pub mask: u32,
    pub token: Option<&'static str>,
    pub label: &'static str,
}

const fn access(mask: u32, token: Option<&'static str>, label: &'static str) -> AccessType {
    AccessType { mask, token, label }
}

const WINDOWS_DEVICE_ACCESS: &[AccessType] = &[
    access(0x01, Some("read"), "Disk Read"),
    access(0x02, Some("write"), "Disk Write"),
    access(0x04, Some("execute"), "Disk Execute"),
    access(0x08, Some("read"), "File Read"),
    access(0x10, Some("write"), "File Write"),
    access(0x20, Some("execute"), "File Execute"),
];

const WINDOWS_PRINTER_ACCESS: &[AccessType] = &[access(PRINT_MASK, None, "Print")];

const WINDOWS_ALL_ACCESS: &[AccessType] = &[
    access(0x01, Some("read"), "Disk Read"),
    access(0x02, Some("write"), "Disk Write"),
    access(0x04, Some("execute"), "Disk Execute"),
    access(0x08, Some("read"), "File Read"),
    access(0x10, Some("write"), "File Write"),
    access(0x20, Some("execute"), "File Execute"),
    access(PRINT_MASK, None, "Print"),
];

const MAC_REMOVABLE_ACCESS: &[AccessType] = &[
    access(0x01, Some("read"), "Read"),
    access(0x02, Some("write"), "Write"),
    access(0x04, Some("execute"), "Execute"),
];

const MAC_APPLE_ACCESS: &[AccessType] = &[
    access(0, Some("backup_device"), "Backup Device"),
    access(0, Some("update_device"), "Update Device"),
    access(0, Some("download_photos_from_device"), "Download Photos From Device"),
    access(0, Some("download_files_from_device"), "Download Files From Device"),
    access(0, Some("sync_content_to_device"), "Sync Content To Device"),
];

const MAC_PORTABLE_ACCESS: &[AccessType] = &[
    access(0, Some("download_files_from_device"), "Download Files From Device"),
    access(0, Some("send_files_to_device"), "Send Files To Device"),
    access(0, Some("download_photos_from_device"), "Download Photos From Device"),
    access(0, Some("debug"), "Debug"),
];

const MAC_BLUETOOTH_ACCESS: &[AccessType] = &[
    access(0, Some("download_files_from_device"), "Download Files From Device"),
    access(0, Some("send_files_to_device"), "Send Files To Device"),
];

const MAC_GENERIC_ACCESS: &[AccessType] = &[
    access(0x01, Some("generic_read"), "Generic Read"),
    access(0x02, Some("generic_write"), "Generic Write"),
    access(0x04, Some("generic_execute"), "Generic Execute"),
];

/// Target-resource classification selecting the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    WindowsDevice,
    WindowsPrinter,
    WindowsGeneric,
    MacRemovableMedia,
    MacAppleDevice,
    MacPortableDevice,
    MacBluetoothDevice,
    MacGeneric,
}

impl EntryType {
    pub const ALL: [EntryType; 8] = [
        EntryType::WindowsDevice,
        EntryType::WindowsPrinter,
        EntryType::WindowsGeneric,
        EntryType::MacRemovableMedia,
        EntryType::MacAppleDevice,
        EntryType::MacPortableDevice,
        EntryType::MacBluetoothDevice,
        EntryType::MacGeneric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntryType::WindowsDevice => "windows_device",
            EntryType::WindowsPrinter => "windows_printer",
            EntryType::WindowsGeneric => "windows_generic",
            EntryType::MacRemovableMedia => "mac_removable_media",
            EntryType::MacAppleDevice => "mac_apple_device",
            EntryType::MacPortableDevice => "mac_portable_device",
            EntryType::MacBluetoothDevice => "mac_bluetooth_device",
            EntryType::MacGeneric => "mac_generic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryType::WindowsDevice => "Windows Device",
            EntryType::WindowsPrinter => "Windows Printer",
            EntryType::WindowsGeneric => "Windows Generic",
            EntryType::MacRemovableMedia => "Mac Removable Media",
            EntryType::MacAppleDevice => "Mac Apple Device",
            EntryType::MacPortableDevice => "Mac Portable Device",
            EntryType::MacBluetoothDevice => "Mac Bluetooth Device",
            EntryType::MacGeneric => "Mac Generic",
        }
    }

    pub fn is_mac(self) -> bool {
        self.mac_type().is_some()
    }

    /// The `$type` of a macOS entry of this kind.
    pub fn mac_type(self) -> Option<&'static str> {
        match self {
            EntryType::MacRemovableMedia => Some("removableMedia"),
            EntryType::MacAppleDevice => Some("appleDevice"),
            EntryType::MacPortableDevice => Some("portableDevice"),
            EntryType::MacBluetoothDevice => Some("bluetoothDevice"),
            EntryType::MacGeneric => Some("generic"),
            _ => None,
        }
    }

    pub fn from_mac_type(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|entry_type| entry_type.mac_type() == Some(value))
    }

    pub fn access_types(self) -> &'static [AccessType] {
        match self {
            EntryType::WindowsDevice => WINDOWS_DEVICE_ACCESS,
            EntryType::WindowsPrinter => WINDOWS_PRINTER_ACCESS,
            EntryType::WindowsGeneric => WINDOWS_ALL_ACCESS,
            EntryType::MacRemovableMedia => MAC_REMOVABLE_ACCESS,
            EntryType::MacAppleDevice => MAC_APPLE_ACCESS,
            EntryType::MacPortableDevice => MAC_PORTABLE_ACCESS,
            EntryType::MacBluetoothDevice => MAC_BLUETOOTH_ACCESS,
            EntryType::MacGeneric => MAC_GENERIC_ACCESS,
        }
    }

    /// Generic type used when a result mixes entry types.
    pub fn generic_for(format: Format) -> Self {
        match format {
            Format::Mac => EntryType::MacGeneric,
            Format::Gpo | Format::OmaUri => EntryType::WindowsGeneric,
        }
    }

    /// Windows classification of an access mask.
    pub fn for_windows_mask(mask: u32) -> Self {
        if mask != 0 && mask & !PRINT_MASK == 0 {
            EntryType::WindowsPrinter
        } else {
            EntryType::WindowsDevice
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A notification option bit and its macOS option token, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationBit {
    pub mask: u32,
    pub label: &'static str,
    pub mac_option: Option<&'static str>,
}

const fn notify(mask: u32, label: &'static str, mac_option: Option<&'static str>) -> NotificationBit {
    NotificationBit {
        mask,
        label,
        mac_option,
    }
}

const ALLOW_NOTIFICATIONS: &[NotificationBit] = &[
    notify(0x04, "Disable", Some("disable_audit_allow")),
    notify(0x08, "Create File Evidence", None),
];

const DENY_NOTIFICATIONS: &[NotificationBit] = &[notify(0x04, "Disable", Some("disable_audit_deny"))];

const AUDIT_ALLOWED_NOTIFICATIONS: &[NotificationBit] = &[
    notify(0x01, "Nothing", None),
    notify(0x02, "Send Event", Some("send_event")),
];

const AUDIT_DENIED_NOTIFICATIONS: &[NotificationBit] = &[
    notify(0x01, "Show Notification", Some("show_notification")),
    notify(0x02, "Send Event", Some("send_event")),
];

/// What an entry does when its groups match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Enforcement {
    Allow,
    Deny,
    AuditAllowed,
    AuditDenied,
}

impl Enforcement {
    pub fn from_windows(value: &str) -> Result<Self, ParseError> {
        match value.trim() {
            "Allow" => Ok(Enforcement::Allow),
            "Deny" => Ok(Enforcement::Deny),
            "AuditAllowed" => Ok(Enforcement::AuditAllowed),
            "AuditDenied" => Ok(Enforcement::AuditDenied),
            other => Err(ParseError::UnknownEnforcement(other.to_string())),
        }
    }

    pub fn from_mac(value: &str) -> Result<Self, ParseError> {
        match value.trim() {
            "allow" => Ok(Enforcement::Allow),
            "deny" => Ok(Enforcement::Deny),
            "auditAllow" => Ok(Enforcement::AuditAllowed),
            "auditDeny" => Ok(Enforcement::AuditDenied),
            other => Err(ParseError::UnknownEnforcement(other.to_string())),
        }
    }

    pub fn as_windows(self) -> &'static str {
        match self {
            Enforcement::Allow => "Allow",
            Enforcement::Deny => "Deny",
            Enforcement::AuditAllowed => "AuditAllowed",
            Enforcement::AuditDenied => "AuditDenied",
        }
    }

    pub fn as_mac(self) -> &'static str {
        match self {
            Enforcement::Allow => "allow",
            Enforcement::Deny => "deny",
            Enforcement::AuditAllowed => "auditAllow",
            Enforcement::AuditDenied => "auditDeny",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Enforcement::Allow => "Allow",
            Enforcement::Deny => "Deny",
            Enforcement::AuditAllowed => "Audit Allowed",
            Enforcement::AuditDenied => "Audit Denied",
        }
    }

    pub fn notification_bits(self) -> &'static [NotificationBit] {
        match self {
            Enforcement::Allow => ALLOW_NOTIFICATIONS,
            Enforcement::Deny => DENY_NOTIFICATIONS,
            Enforcement::AuditAllowed => AUDIT_ALLOWED_NOTIFICATIONS,
            Enforcement::AuditDenied => AUDIT_DENIED_NOTIFICATIONS,
        }
    }
}

/// One permission statement of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: String,
    pub format: Format,
    pub entry_type: EntryType,
    pub enforcement: Enforcement,
    pub access_mask: u32,
    pub options: u32,
    /// macOS access tokens as written in the source.
    pub mac_access: Vec<String>,
    /// macOS enforcement option tokens as written in the source.
    pub mac_options: Vec<String>,
    /// User or group SID; `None` applies to all users.
    pub sid: Option<String>,
    pub computer_sid: Option<String>,
    pub parameters: Option<Parameters>,
}

impl Entry {
    /// Windows entry; the entry type follows from the access mask.
    pub fn windows(id: impl Into<String>, enforcement: Enforcement, access_mask: u32, options: u32) -> Self {
        Self {
            id: id.into(),
            format: Format::Gpo,
            entry_type: EntryType::for_windows_mask(access_mask),
            enforcement,
            access_mask,
            options,
            mac_access: Vec::new(),
            mac_options: Vec::new(),
            sid: None,
            computer_sid: None,
            parameters: None,
        }
    }

    /// macOS entry; Windows mask and option bits are derived from the tokens.
    pub fn mac(
        id: impl Into<String>,
        entry_type: EntryType,
        enforcement: Enforcement,
        access: Vec<String>,
        options: Vec<String>,
    ) -> Self {
        let access_mask = entry_type
            .access_types()
            .iter()
            .filter(|a| a.token.is_some_and(|token| access.iter().any(|t| t == token)))
            .fold(0, |mask, a| mask | a.mask);
        let option_bits = enforcement
            .notification_bits()
            .iter()
            .filter(|bit| bit.mac_option.is_some_and(|token| options.iter().any(|o| o == token)))
            .fold(0, |bits, bit| bits | bit.mask);
        Self {
            id: id.into(),
            format: Format::Mac,
            entry_type,
            enforcement,
            access_mask,
            options: option_bits,
            mac_access: access,
            mac_options: options,
            sid: None,
            computer_sid: None,
            parameters: None,
        }
    }

    /// Whether this entry grants `access`.
    pub fn grants(&self, access: &AccessType) -> bool {
        match self.format {
            Format::Mac => access
                .token
                .is_some_and(|token| self.mac_access.iter().any(|t| t == token)),
            Format::Gpo | Format::OmaUri => access.mask != 0 && self.access_mask & access.mask != 0,
        }
    }

    /// Access decisions for every access type of `entry_type`, in table order.
    ///
    /// The table is chosen by the caller so a report can render all entries
    /// of a mixed result against the same columns.
    pub fn permissions(&self, entry_type: EntryType) -> Vec<(&'static str, bool)> {
        entry_type
            .access_types()
            .iter()
            .map(|access| (access.label, self.grants(access)))
            .collect()
    }

    /// Notification labels; `["Nothing"]` when no option is set.
    pub fn notifications(&self) -> Vec<String> {
        let bits = self.enforcement.notification_bits();
        let mut out: Vec<String> = match self.format {
            Format::Mac => self
                .mac_options
                .iter()
                .map(|token| {
                    bits.iter()
                        .find(|bit| bit.mac_option == Some(token.as_str()))
                        .map(|bit| bit.label.to_string())
                        .unwrap_or_else(|| token.clone())
                })
                .collect(),
            Format::Gpo | Format::OmaUri => bits
                .iter()
                .filter(|bit| self.options & bit.mask != 0)
                .map(|bit| bit.label.to_string())
                .collect(),
        };
        if out.is_empty() {
            out.push("Nothing".to_string());
        }
        out
    }

    pub fn has_user_condition(&self) -> bool {
        self.sid.is_some()
    }

    pub fn has_computer_condition(&self) -> bool {
        self.computer_sid.is_some()
    }

    pub fn sid_label(&self) -> &str {
        self.sid.as_deref().unwrap_or("All Users")
    }

    pub fn condition_match_type(&self) -> Option<&str> {
        self.parameters.as_ref().map(|p| p.match_type.as_str())
    }

    /// Group ids referenced from this entry's conditions.
    pub fn group_ids(&self) -> Vec<&str> {
        self.parameters
            .as_ref()
            .map(Parameters::group_ids)
            .unwrap_or_default()
    }

    pub fn to_xml(&self, indent: &str) -> String {
        let inner = format!("{indent}\t");
        let mut out = open_tag(indent, "Entry", &[("Id", &self.id)]);
        out.push_str(&text_element(&inner, "Type", self.enforcement.as_windows()));
        out.push_str(&text_element(&inner, "AccessMask", &self.access_mask.to_string()));
        out.push_str(&text_element(&inner, "Options", &self.options.to_string()));
        if let Some(sid) = &self.sid {
            out.push_str(&text_element(&inner, "Sid", sid));
        }
        if let Some(sid) = &self.computer_sid {
            out.push_str(&text_element(&inner, "ComputerSid", sid));
        }
        if let Some(parameters) = &self.parameters {
            out.push_str(&parameters.to_xml(&inner));
        }
        out.push_str(&close_tag(indent, "Entry"));
        out
    }

    /// macOS JSON of a macOS entry, as found in the source.
    pub fn to_mac_json(&self) -> Value {
        let mut enforcement = json!({"$type": self.enforcement.as_mac()});
        if !self.mac_options.is_empty() {
            enforcement["options"] = json!(self.mac_options);
        }
        json!({
            "$type": self.entry_type.mac_type().unwrap_or("generic"),
            "enforcement": enforcement,
            "access": self.mac_access,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Enforcement, Entry, EntryType};

    #[test]
    fn access_mask_five_grants_disk_read_and_execute() {
        let entry = Entry::windows("e", Enforcement::Allow, 5, 0);
        let permissions = entry.permissions(EntryType::WindowsDevice);
        let granted: Vec<&str> = permissions
            .iter()
            .filter(|(_, granted)| *granted)
            .map(|(label, _)| *label)
            .collect();
        assert_eq!(granted, vec!["Disk Read", "Disk Execute"]);
        assert_eq!(permissions.len(), 6);
    }

    #[test]
    fn zero_options_means_nothing() {
        let entry = Entry::windows("e", Enforcement::Allow, 1, 0);
        assert_eq!(entry.notifications(), vec!["Nothing".to_string()]);
    }

    #[test]
    fn notification_bits_depend_on_enforcement() {
        let denied = Entry::windows("e", Enforcement::AuditDenied, 7, 3);
        assert_eq!(denied.notifications(), vec!["Show Notification", "Send Event"]);
        let allowed = Entry::windows("e", Enforcement::Allow, 7, 0x0c);
        assert_eq!(allowed.notifications(), vec!["Disable", "Create File Evidence"]);
    }

    #[test]
    fn print_only_mask_is_a_printer_entry() {
        assert_eq!(EntryType::for_windows_mask(64), EntryType::WindowsPrinter);
        assert_eq!(EntryType::for_windows_mask(65), EntryType::WindowsDevice);
        assert_eq!(EntryType::for_windows_mask(0), EntryType::WindowsDevice);
    }

    #[test]
    fn mac_entry_derives_windows_bits() {
        let entry = Entry::mac(
            "m",
            EntryType::MacRemovableMedia,
            Enforcement::AuditDenied,
            vec!["read".into(), "execute".into()],
            vec!["send_event".into()],
        );
        assert_eq!(entry.access_mask, 0x05);
        assert_eq!(entry.options, 0x02);
        assert_eq!(entry.notifications(), vec!["Send Event"]);
        assert!(entry
            .permissions(EntryType::WindowsDevice)
            .contains(&("Disk Read", true)));
    }

    #[test]
    fn xml_omits_default_sid() {
        let entry = Entry::windows("{e}", Enforcement::Deny, 7, 0);
        let xml = entry.to_xml("\t");
        assert!(xml.starts_with("\t<Entry Id=\"{e}\">\n"));
        assert!(!xml.contains("<Sid>"));
        assert!(xml.ends_with("\t</Entry>\n"));
    }
}
