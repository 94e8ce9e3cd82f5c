//! Display-mode catalog and static per-mode tables.
//!
//! The catalog is enumerated once when a controller is built and never
//! mutated afterwards, so it can be read from any thread without locking.
//! Current size and rate are always derived from here, never read back
//! from the hardware.

use super::frame::FrameSize;
use super::sdk::api::VideoInput;
use super::sdk::types::DisplayModeId;

/// Name reported when the driver cannot name a mode.
pub const UNKNOWN_MODE_NAME: &str = "Unknown mode";

/// One supported capture mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeEntry {
    pub mode: DisplayModeId,
    pub width: u32,
    pub height: u32,
    /// Driver-supplied name, `None` if the lookup failed.
    pub name: Option<String>,
}

impl ModeEntry {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Immutable list of modes supported by one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeCatalog {
    entries: Vec<ModeEntry>,
}

impl ModeCatalog {
    pub fn new(entries: Vec<ModeEntry>) -> Self {
        Self { entries }
    }

    /// Enumerate the modes of `input`.
    ///
    /// A failed enumeration yields an empty catalog.
    pub fn from_input(input: &dyn VideoInput) -> Self {
        let modes = match input.display_modes() {
            Ok(modes) => modes,
            Err(e) => {
                tracing::warn!("Display mode enumeration failed, catalog is empty: {e}");
                return Self::default();
            }
        };

        let entries = modes
            .iter()
            .map(|m| ModeEntry {
                mode: m.mode_id(),
                width: m.width(),
                height: m.height(),
                name: m
                    .name()
                    .map_err(|e| tracing::debug!("No name for mode {}: {e}", m.mode_id()))
                    .ok(),
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModeEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeEntry> {
        self.entries.iter()
    }

    /// Display names in catalog order, with a literal fallback per entry.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                e.name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_MODE_NAME.to_string())
            })
            .collect()
    }

    /// Buffer size for `mode`, or [`FrameSize::ZERO`] when the device
    /// does not list it.
    pub fn buffer_size(&self, mode: DisplayModeId) -> FrameSize {
        match self.entries.iter().find(|e| e.mode == mode) {
            Some(entry) => entry.size(),
            None => {
                tracing::warn!("No display mode {mode} in catalog, returning zero resolution");
                FrameSize::ZERO
            }
        }
    }
}

/// Buffer frame rate for `mode`. `0.0` means the mode is not in the table.
///
/// SD modes report 23.98. 1080p29.97, 2160p50 and 2160p59.94 are absent.
pub fn frame_rate(mode: DisplayModeId) -> f32 {
    use DisplayModeId as M;

    match mode {
        M::NTSC_2398
        | M::NTSC
        | M::NTSC_P
        | M::PAL
        | M::PAL_P
        | M::HD1080P_2398
        | M::MODE_2K_2398
        | M::MODE_2K_DCI_2398
        | M::UHD2160P_2398
        | M::MODE_4K_DCI_2398 => 23.98,

        M::HD1080P_24 | M::MODE_2K_24 | M::MODE_2K_DCI_24 | M::UHD2160P_24 | M::MODE_4K_DCI_24 => {
            24.0
        }

        M::HD1080P_25 | M::MODE_2K_25 | M::MODE_2K_DCI_25 | M::UHD2160P_25 | M::MODE_4K_DCI_25 => {
            25.0
        }

        M::HD1080P_30 | M::UHD2160P_30 => 30.0,

        M::HD720P_50 | M::HD1080I_50 | M::HD1080P_50 => 50.0,

        M::HD720P_5994 | M::HD1080I_5994 | M::HD1080P_5994 => 59.94,

        M::HD720P_60 | M::HD1080I_6000 | M::HD1080P_6000 | M::UHD2160P_60 => 60.0,

        M::UHD2160P_2997 => 29.97,

        _ => 0.0,
    }
}

/// Static name for `mode` (e.g. `"Mode HD1080p2398"`), empty if unknown.
pub fn display_mode_string(mode: DisplayModeId) -> &'static str {
    use DisplayModeId as M;

    match mode {
        M::NTSC => "Mode NTSC",
        M::NTSC_2398 => "Mode NTSC2398",
        M::PAL => "Mode PAL",
        M::NTSC_P => "Mode NTSCp",
        M::PAL_P => "Mode PALp",
        M::HD1080P_2398 => "Mode HD1080p2398",
        M::HD1080P_24 => "Mode HD1080p24",
        M::HD1080P_25 => "Mode HD1080p25",
        M::HD1080P_2997 => "Mode HD1080p2997",
        M::HD1080P_30 => "Mode HD1080p30",
        M::HD1080I_50 => "Mode HD1080i50",
        M::HD1080I_5994 => "Mode HD1080i5994",
        M::HD1080I_6000 => "Mode HD1080i6000",
        M::HD1080P_50 => "Mode HD1080p50",
        M::HD1080P_5994 => "Mode HD1080p5994",
        M::HD1080P_6000 => "Mode HD1080p6000",
        M::HD720P_50 => "Mode HD720p50",
        M::HD720P_5994 => "Mode HD720p5994",
        M::HD720P_60 => "Mode HD720p60",
        M::MODE_2K_2398 => "Mode 2k2398",
        M::MODE_2K_24 => "Mode 2k24",
        M::MODE_2K_25 => "Mode 2k25",
        M::MODE_2K_DCI_2398 => "Mode 2kDCI2398",
        M::MODE_2K_DCI_24 => "Mode 2kDCI24",
        M::MODE_2K_DCI_25 => "Mode 2kDCI25",
        M::UHD2160P_2398 => "Mode 4K2160p2398",
        M::UHD2160P_24 => "Mode 4K2160p24",
        M::UHD2160P_25 => "Mode 4K2160p25",
        M::UHD2160P_2997 => "Mode 4K2160p2997",
        M::UHD2160P_30 => "Mode 4K2160p30",
        M::UHD2160P_50 => "Mode 4K2160p50",
        M::UHD2160P_5994 => "Mode 4K2160p5994",
        M::UHD2160P_60 => "Mode 4K2160p60",
        M::MODE_4K_DCI_2398 => "Mode 4kDCI2398",
        M::MODE_4K_DCI_24 => "Mode 4kDCI24",
        M::MODE_4K_DCI_25 => "Mode 4kDCI25",
        M::UNKNOWN => "Mode Unknown",
        _ => "",
    }
}
