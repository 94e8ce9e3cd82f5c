//! Driver-level identifiers, pixel formats, and flag sets.
//!
//! Display modes and pixel formats are four-character codes packed
//! big-endian into a `u32`, the same encoding the capture-card driver uses.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Pack a four-character code into a big-endian `u32`.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    ((code[0] as u32) << 24) | ((code[1] as u32) << 16) | ((code[2] as u32) << 8) | code[3] as u32
}

/// Identifier of a hardware display mode (resolution + timing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayModeId(pub u32);

impl DisplayModeId {
    pub const NTSC: Self = Self(fourcc(b"ntsc"));
    pub const NTSC_2398: Self = Self(fourcc(b"nt23"));
    pub const PAL: Self = Self(fourcc(b"pal "));
    pub const NTSC_P: Self = Self(fourcc(b"ntsp"));
    pub const PAL_P: Self = Self(fourcc(b"palp"));

    pub const HD1080P_2398: Self = Self(fourcc(b"23ps"));
    pub const HD1080P_24: Self = Self(fourcc(b"24ps"));
    pub const HD1080P_25: Self = Self(fourcc(b"Hp25"));
    pub const HD1080P_2997: Self = Self(fourcc(b"Hp29"));
    pub const HD1080P_30: Self = Self(fourcc(b"Hp30"));
    pub const HD1080I_50: Self = Self(fourcc(b"Hi50"));
    pub const HD1080I_5994: Self = Self(fourcc(b"Hi59"));
    pub const HD1080I_6000: Self = Self(fourcc(b"Hi60"));
    pub const HD1080P_50: Self = Self(fourcc(b"Hp50"));
    pub const HD1080P_5994: Self = Self(fourcc(b"Hp59"));
    pub const HD1080P_6000: Self = Self(fourcc(b"Hp60"));

    pub const HD720P_50: Self = Self(fourcc(b"hp50"));
    pub const HD720P_5994: Self = Self(fourcc(b"hp59"));
    pub const HD720P_60: Self = Self(fourcc(b"hp60"));

    pub const MODE_2K_2398: Self = Self(fourcc(b"2k23"));
    pub const MODE_2K_24: Self = Self(fourcc(b"2k24"));
    pub const MODE_2K_25: Self = Self(fourcc(b"2k25"));
    pub const MODE_2K_DCI_2398: Self = Self(fourcc(b"2d23"));
    pub const MODE_2K_DCI_24: Self = Self(fourcc(b"2d24"));
    pub const MODE_2K_DCI_25: Self = Self(fourcc(b"2d25"));

    pub const UHD2160P_2398: Self = Self(fourcc(b"4k23"));
    pub const UHD2160P_24: Self = Self(fourcc(b"4k24"));
    pub const UHD2160P_25: Self = Self(fourcc(b"4k25"));
    pub const UHD2160P_2997: Self = Self(fourcc(b"4k29"));
    pub const UHD2160P_30: Self = Self(fourcc(b"4k30"));
    pub const UHD2160P_50: Self = Self(fourcc(b"4k50"));
    pub const UHD2160P_5994: Self = Self(fourcc(b"4k59"));
    pub const UHD2160P_60: Self = Self(fourcc(b"4k60"));
    pub const MODE_4K_DCI_2398: Self = Self(fourcc(b"4d23"));
    pub const MODE_4K_DCI_24: Self = Self(fourcc(b"4d24"));
    pub const MODE_4K_DCI_25: Self = Self(fourcc(b"4d25"));

    pub const UNKNOWN: Self = Self(fourcc(b"iunk"));

    /// The four-character code as a string (e.g. `"23ps"`).
    pub fn code(&self) -> String {
        self.0.to_be_bytes().iter().map(|&b| b as char).collect()
    }
}

impl fmt::Display for DisplayModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl TryFrom<String> for DisplayModeId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| format!("display mode code must be 4 ASCII characters: {value:?}"))?;
        if !bytes.iter().all(u8::is_ascii) {
            return Err(format!("display mode code must be ASCII: {value:?}"));
        }
        Ok(Self(fourcc(&bytes)))
    }
}

impl From<DisplayModeId> for String {
    fn from(mode: DisplayModeId) -> Self {
        mode.code()
    }
}

/// Pixel layout requested from, or delivered by, the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit 4:2:2 YUV.
    Yuv8,
    /// 10-bit 4:2:2 YUV.
    Yuv10,
    /// 8-bit ARGB.
    Argb8,
    /// 8-bit BGRA.
    Bgra8,
    /// 10-bit RGB.
    Rgb10,
}

impl PixelFormat {
    /// Driver four-cc for this format.
    pub fn code(&self) -> u32 {
        match self {
            PixelFormat::Yuv8 => fourcc(b"2vuy"),
            PixelFormat::Yuv10 => fourcc(b"v210"),
            PixelFormat::Argb8 => 32,
            PixelFormat::Bgra8 => fourcc(b"BGRA"),
            PixelFormat::Rgb10 => fourcc(b"r210"),
        }
    }
}

bitflags! {
    /// Flags passed to `enable_video_input`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VideoInputFlags: u32 {
        const ENABLE_FORMAT_DETECTION = 1 << 0;
        const DUAL_STREAM_3D          = 1 << 1;
    }
}

bitflags! {
    /// Per-frame flags reported by the hardware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u32 {
        const FLIP_VERTICAL       = 1 << 0;
        const HAS_NO_INPUT_SOURCE = 1 << 31;
    }
}

bitflags! {
    /// Signal properties reported alongside a format change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DetectedSignalFlags: u32 {
        const YCBCR_422      = 1 << 0;
        const RGB_444        = 1 << 1;
        const DUAL_STREAM_3D = 1 << 2;
    }
}

bitflags! {
    /// Which aspects of the input signal changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatChangedEvents: u32 {
        const DISPLAY_MODE_CHANGED    = 1 << 0;
        const FIELD_DOMINANCE_CHANGED = 1 << 1;
        const COLORSPACE_CHANGED      = 1 << 2;
    }
}

/// Embedded timecode sources a frame may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimecodeFormat {
    VitcField1,
    VitcField2,
    Rp188Vitc1,
    Rp188Vitc2,
    Rp188Ltc,
}

/// A timecode read off a frame.
///
/// `value` is `None` when the timecode exists but its string form could
/// not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timecode {
    pub value: Option<String>,
    pub user_bits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_packs_big_endian() {
        assert_eq!(fourcc(b"23ps"), 0x3233_7073);
    }

    #[test]
    fn display_mode_code_round_trips_through_string() {
        let mode = DisplayModeId::HD720P_60;
        assert_eq!(mode.code(), "hp60");
        assert_eq!(DisplayModeId::try_from("hp60".to_string()).unwrap(), mode);
    }

    #[test]
    fn display_mode_rejects_bad_codes() {
        assert!(DisplayModeId::try_from("hp6".to_string()).is_err());
        assert!(DisplayModeId::try_from("hp600".to_string()).is_err());
    }

    #[test]
    fn display_mode_serialises_as_code() {
        let json = serde_json::to_string(&DisplayModeId::PAL).unwrap();
        assert_eq!(json, "\"pal \"");
        let back: DisplayModeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DisplayModeId::PAL);
    }

    #[test]
    fn flag_sets_combine_and_test() {
        let mut flags = VideoInputFlags::empty();
        assert!(!flags.contains(VideoInputFlags::ENABLE_FORMAT_DETECTION));
        flags |= VideoInputFlags::ENABLE_FORMAT_DETECTION;
        assert!(flags.contains(VideoInputFlags::ENABLE_FORMAT_DETECTION));
        assert!(!flags.contains(VideoInputFlags::DUAL_STREAM_3D));

        let detected = DetectedSignalFlags::RGB_444 | DetectedSignalFlags::DUAL_STREAM_3D;
        assert!(detected.contains(DetectedSignalFlags::RGB_444));
        assert!(!detected.contains(DetectedSignalFlags::YCBCR_422));
    }

    #[test]
    fn empty_flag_set_is_contained_everywhere() {
        assert!(FrameFlags::empty().contains(FrameFlags::empty()));
        assert!(FrameFlags::HAS_NO_INPUT_SOURCE.contains(FrameFlags::empty()));
        assert_eq!(FrameFlags::default(), FrameFlags::empty());
    }
}
