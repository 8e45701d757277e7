use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ParseError;
use crate::model::OMA_URI_ROOT;
use crate::oma_uri::{IntuneCustomRow, OmaDataType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DefaultEnforcement {
    Allow,
    #[default]
    Deny,
}

impl DefaultEnforcement {
    fn parse(value: &str) -> Result<Self, ParseError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(DefaultEnforcement::Allow),
            "deny" => Ok(DefaultEnforcement::Deny),
            _ => Err(ParseError::UnknownEnforcement(value.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DefaultEnforcement::Allow => "Allow",
            DefaultEnforcement::Deny => "Deny",
        }
    }

    fn intune_value(self) -> u32 {
        match self {
            DefaultEnforcement::Allow => 1,
            DefaultEnforcement::Deny => 2,
        }
    }
}

/// Policy-wide device control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub default_enforcement: DefaultEnforcement,
    pub device_control_enabled: bool,
    pub navigation_target: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_enforcement: DefaultEnforcement::Deny,
            device_control_enabled: true,
            navigation_target: None,
        }
    }
}

impl Settings {
    /// Read the `settings` object of a macOS policy.
    pub fn from_mac_json(value: &Value) -> Result<Self, ParseError> {
        let mut settings = Settings::default();
        if let Some(enforcement) = value
            .pointer("/global/defaultEnforcement")
            .and_then(Value::as_str)
        {
            settings.default_enforcement = DefaultEnforcement::parse(enforcement)?;
        }
        if let Some(disabled) = value
            .pointer("/features/removableMedia/disable")
            .and_then(Value::as_bool)
        {
            settings.device_control_enabled = !disabled;
        }
        settings.navigation_target = value
            .pointer("/ux/navigationTarget")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(settings)
    }

    /// Read the `settings` object of a scenario.
    pub fn from_scenario_json(value: &Value) -> Result<Self, ParseError> {
        let object = value
            .as_object()
            .ok_or_else(|| ParseError::Shape(format!("scenario settings is not an object: {value}")))?;
        let mut settings = Settings::default();
        if let Some(enforcement) = object.get("DefaultEnforcement").and_then(Value::as_str) {
            settings.default_enforcement = DefaultEnforcement::parse(enforcement)?;
        }
        if let Some(enabled) = object.get("DeviceControlEnabled").and_then(Value::as_bool) {
            settings.device_control_enabled = enabled;
        }
        Ok(settings)
    }

    pub fn intune_rows(&self) -> Vec<IntuneCustomRow> {
        vec![
            IntuneCustomRow {
                name: "Device Control Enabled".to_string(),
                description: if self.device_control_enabled {
                    "Enabled".to_string()
                } else {
                    "Disabled".to_string()
                },
                oma_uri: format!("{OMA_URI_ROOT}/DeviceControlEnabled"),
                data_type: OmaDataType::Integer,
                value: u32::from(self.device_control_enabled).to_string(),
            },
            IntuneCustomRow {
                name: "Default Enforcement".to_string(),
                description: self.default_enforcement.label().to_string(),
                oma_uri: format!("{OMA_URI_ROOT}/DefaultEnforcement"),
                data_type: OmaDataType::Integer,
                value: self.default_enforcement.intune_value().to_string(),
            },
        ]
    }

    pub fn to_mac_json(&self) -> Value {
        let mut settings = json!({
            "features": {"removableMedia": {"disable": !self.device_control_enabled}},
            "global": {"defaultEnforcement": self.default_enforcement.label().to_ascii_lowercase()},
        });
        if let Some(target) = &self.navigation_target {
            settings["ux"] = json!({"navigationTarget": target});
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DefaultEnforcement, Settings};

    #[test]
    fn reads_mac_settings() {
        let settings = Settings::from_mac_json(&json!({
            "features": {"removableMedia": {"disable": true}},
            "global": {"defaultEnforcement": "allow"},
            "ux": {"navigationTarget": "http://example.com"}
        }))
        .expect("settings");
        assert_eq!(settings.default_enforcement, DefaultEnforcement::Allow);
        assert!(!settings.device_control_enabled);
        assert_eq!(settings.navigation_target.as_deref(), Some("http://example.com"));
    }

    #[test]
    fn scenario_settings_produce_intune_rows() {
        let settings = Settings::from_scenario_json(&json!({
            "DefaultEnforcement": "Allow",
            "DeviceControlEnabled": true
        }))
        .expect("settings");
        let rows = settings.intune_rows();
        assert_eq!(rows[0].value, "1");
        assert_eq!(
            rows[1].oma_uri,
            "./Vendor/MSFT/Defender/Configuration/DefaultEnforcement"
        );
        assert_eq!(rows[1].value, "1");
        assert_eq!(Settings::default().intune_rows()[1].value, "2");
    }

    #[test]
    fn mac_json_round_trips() {
        let value = json!({
            "features": {"removableMedia": {"disable": false}},
            "global": {"defaultEnforcement": "deny"}
        });
        let settings = Settings::from_mac_json(&value).expect("settings");
        assert_eq!(settings.to_mac_json(), value);
    }

    #[test]
    fn unknown_enforcement_is_rejected() {
        assert!(Settings::from_scenario_json(&json!({"DefaultEnforcement": "Maybe"})).is_err());
    }
}
