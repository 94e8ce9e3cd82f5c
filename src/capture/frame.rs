//! Conversion destination frame and per-frame metadata.

use serde::Serialize;

use super::sdk::api::VideoFrame;
use super::sdk::types::{FrameFlags, PixelFormat, TimecodeFormat};

/// Bytes per pixel of the fixed 8-bit BGRA layout.
pub const BYTES_PER_PIXEL: usize = 4;

/// Frame dimensions in pixels. `(0, 0)` means "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An 8-bit, 4-channel BGRA pixel buffer.
///
/// Only ever a decode target: it reports no flags and carries no
/// timecode or ancillary data. The default value is a valid zero-size
/// placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFrameBgra {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl VideoFrameBgra {
    /// Allocate a zeroed `width * height * 4` buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl VideoFrame for VideoFrameBgra {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn row_bytes(&self) -> u32 {
        self.width * BYTES_PER_PIXEL as u32
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra8
    }

    fn flags(&self) -> FrameFlags {
        FrameFlags::empty()
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Timecodes and user bits carried by the most recent frame.
///
/// Missing timecodes are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timecodes {
    pub vitc_f1_timecode: String,
    pub vitc_f1_user_bits: String,
    pub vitc_f2_timecode: String,
    pub vitc_f2_user_bits: String,

    pub rp188_vitc1_timecode: String,
    pub rp188_vitc1_user_bits: String,
    pub rp188_vitc2_timecode: String,
    pub rp188_vitc2_user_bits: String,
    pub rp188_ltc_timecode: String,
    pub rp188_ltc_user_bits: String,
}

impl Timecodes {
    /// Read every supported timecode off `frame`.
    pub fn from_frame(frame: &dyn VideoFrame) -> Self {
        let (vitc_f1_timecode, vitc_f1_user_bits) =
            read_timecode(frame, TimecodeFormat::VitcField1);
        let (vitc_f2_timecode, vitc_f2_user_bits) =
            read_timecode(frame, TimecodeFormat::VitcField2);
        let (rp188_vitc1_timecode, rp188_vitc1_user_bits) =
            read_timecode(frame, TimecodeFormat::Rp188Vitc1);
        let (rp188_vitc2_timecode, rp188_vitc2_user_bits) =
            read_timecode(frame, TimecodeFormat::Rp188Vitc2);
        let (rp188_ltc_timecode, rp188_ltc_user_bits) =
            read_timecode(frame, TimecodeFormat::Rp188Ltc);

        Self {
            vitc_f1_timecode,
            vitc_f1_user_bits,
            vitc_f2_timecode,
            vitc_f2_user_bits,
            rp188_vitc1_timecode,
            rp188_vitc1_user_bits,
            rp188_vitc2_timecode,
            rp188_vitc2_user_bits,
            rp188_ltc_timecode,
            rp188_ltc_user_bits,
        }
    }
}

/// Returns `(timecode, user_bits)`, both empty when the frame has none.
fn read_timecode(frame: &dyn VideoFrame, format: TimecodeFormat) -> (String, String) {
    match frame.timecode(format) {
        Some(tc) => (
            tc.value.unwrap_or_default(),
            format!("0x{:08X}", tc.user_bits),
        ),
        None => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sdk::mock::MockFrame;

    #[test]
    fn default_frame_is_zero_size_placeholder() {
        let frame = VideoFrameBgra::default();
        assert_eq!(frame.size(), FrameSize::ZERO);
        assert!(frame.data().is_empty());
        assert_eq!(frame.row_bytes(), 0);
    }

    #[test]
    fn new_frame_is_zeroed_and_sized() {
        let frame = VideoFrameBgra::new(4, 3);
        assert_eq!(frame.data().len(), 4 * 3 * 4);
        assert!(frame.data().iter().all(|&b| b == 0));
        assert_eq!(frame.row_bytes(), 16);
    }

    #[test]
    fn frame_reports_fixed_layout_without_metadata() {
        let frame = VideoFrameBgra::new(2, 2);
        assert_eq!(frame.pixel_format(), PixelFormat::Bgra8);
        assert_eq!(frame.flags(), FrameFlags::empty());
        assert!(frame.timecode(TimecodeFormat::Rp188Ltc).is_none());
    }

    #[test]
    fn frame_size_zero_detection() {
        assert!(FrameSize::ZERO.is_zero());
        assert!(FrameSize::new(1920, 0).is_zero());
        assert!(!FrameSize::new(1280, 720).is_zero());
    }

    #[test]
    fn timecodes_default_to_empty_strings() {
        let frame = MockFrame::filled(2, 2, 0);
        let tc = Timecodes::from_frame(&frame);
        assert_eq!(tc, Timecodes::default());
    }

    #[test]
    fn timecodes_read_present_fields() {
        let frame = MockFrame::filled(2, 2, 0)
            .with_timecode(TimecodeFormat::Rp188Ltc, Some("10:00:00:01"), 0xAB)
            .with_timecode(TimecodeFormat::VitcField1, None, 0x1);

        let tc = Timecodes::from_frame(&frame);
        assert_eq!(tc.rp188_ltc_timecode, "10:00:00:01");
        assert_eq!(tc.rp188_ltc_user_bits, "0x000000AB");
        assert_eq!(tc.vitc_f1_timecode, "");
        assert_eq!(tc.vitc_f1_user_bits, "0x00000001");
        assert_eq!(tc.rp188_vitc2_timecode, "");
        assert_eq!(tc.rp188_vitc2_user_bits, "");
    }

    #[test]
    fn timecodes_serialise_camel_case() {
        let json = serde_json::to_value(Timecodes::default()).unwrap();
        assert!(json.get("rp188LtcTimecode").is_some());
        assert!(json.get("vitcF1UserBits").is_some());
    }
}
