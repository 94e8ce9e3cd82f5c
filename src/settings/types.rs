use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capture::sdk::types::DisplayModeId;

/// Per-device preferences, keyed by 1-based device ordinal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceSettings {
    /// Mode to start in; `None` uses the global default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<DisplayModeId>,
}

/// Top-level capture settings file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    /// Mode used when a device has no preference of its own.
    pub default_mode: DisplayModeId,
    /// Request hardware format detection on devices that support it.
    pub format_detection: bool,
    pub devices: BTreeMap<u8, DeviceSettings>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            default_mode: DisplayModeId::HD1080P_2398,
            format_detection: true,
            devices: BTreeMap::new(),
        }
    }
}

impl CaptureSettings {
    /// Mode to start device `ordinal` in.
    pub fn mode_for(&self, ordinal: usize) -> DisplayModeId {
        u8::try_from(ordinal)
            .ok()
            .and_then(|id| self.devices.get(&id))
            .and_then(|d| d.mode)
            .unwrap_or(self.default_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hd_23_98_with_detection() {
        let settings = CaptureSettings::default();
        assert_eq!(settings.default_mode, DisplayModeId::HD1080P_2398);
        assert!(settings.format_detection);
        assert!(settings.devices.is_empty());
    }

    #[test]
    fn mode_for_prefers_device_setting() {
        let mut settings = CaptureSettings::default();
        settings.devices.insert(
            2,
            DeviceSettings {
                mode: Some(DisplayModeId::HD720P_50),
            },
        );
        settings.devices.insert(3, DeviceSettings::default());

        assert_eq!(settings.mode_for(2), DisplayModeId::HD720P_50);
        assert_eq!(settings.mode_for(3), DisplayModeId::HD1080P_2398);
        assert_eq!(settings.mode_for(1), DisplayModeId::HD1080P_2398);
        assert_eq!(settings.mode_for(1000), DisplayModeId::HD1080P_2398);
    }

    #[test]
    fn serialises_modes_as_four_cc() {
        let mut settings = CaptureSettings::default();
        settings.devices.insert(
            1,
            DeviceSettings {
                mode: Some(DisplayModeId::HD1080P_25),
            },
        );
        let json = serde_json::to_value(&settings).unwrap();

        assert_eq!(json["defaultMode"], "23ps");
        assert_eq!(json["formatDetection"], true);
        assert_eq!(json["devices"]["1"]["mode"], "Hp25");
    }

    #[test]
    fn deserialises_partial_json_with_defaults() {
        let json = r#"{ "devices": { "2": { "mode": "hp60" } } }"#;
        let settings: CaptureSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.default_mode, DisplayModeId::HD1080P_2398);
        assert!(settings.format_detection);
        assert_eq!(settings.mode_for(2), DisplayModeId::HD720P_60);
    }

    #[test]
    fn rejects_malformed_mode_codes() {
        let json = r#"{ "defaultMode": "toolong" }"#;
        assert!(serde_json::from_str::<CaptureSettings>(json).is_err());
    }
}
