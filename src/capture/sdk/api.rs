//! Capture-card driver abstraction.
//!
//! The real driver bindings and the simulated driver in [`super::mock`]
//! both implement these traits, so the controller, discovery, and registry
//! never know which one they are talking to.
//!
//! Driver objects are shared with `Arc`: every holder keeps one counted
//! reference and the object is released when the last holder drops it.

use std::sync::Arc;

use crate::capture::error::Result;
use crate::capture::frame::VideoFrameBgra;

use super::types::{
    DetectedSignalFlags, DisplayModeId, FormatChangedEvents, FrameFlags, PixelFormat, Timecode,
    TimecodeFormat, VideoInputFlags,
};

/// Entry point into the driver: creates the per-process sessions.
pub trait CaptureApi: Send + Sync {
    /// Create the hardware enumeration session.
    fn create_discovery(&self) -> Result<Arc<dyn DiscoverySession>>;

    /// Create the shared pixel-format converter.
    fn create_video_converter(&self) -> Result<Arc<dyn FrameConverter>>;
}

/// Hardware enumeration session.
pub trait DiscoverySession: Send + Sync {
    /// Start delivering arrival/removal notifications to `callback`.
    ///
    /// Devices already present are reported as arrivals, on the driver's
    /// notification thread.
    fn install_device_notifications(
        &self,
        callback: Arc<dyn DeviceNotificationCallback>,
    ) -> Result<()>;

    /// Stop delivering notifications and release the installed callback.
    fn uninstall_device_notifications(&self) -> Result<()>;
}

/// Receiver of device arrival/removal notifications.
pub trait DeviceNotificationCallback: Send + Sync {
    fn device_arrived(&self, device: Arc<dyn Device>);
    fn device_removed(&self, device: Arc<dyn Device>);
}

/// One capture device (connector) as exposed by the driver.
pub trait Device: Send + Sync {
    /// Human-readable device name.
    fn display_name(&self) -> Result<String>;

    /// Ordinal of this connector among several on the same card.
    fn sub_device_index(&self) -> Result<i64>;

    /// Whether the input can detect signal-format changes on its own.
    fn supports_input_format_detection(&self) -> Result<bool>;

    /// Acquire the input-stream interface.
    fn video_input(&self) -> Result<Arc<dyn VideoInput>>;
}

/// A hardware-supported display mode.
pub trait DisplayMode: Send + Sync {
    fn mode_id(&self) -> DisplayModeId;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Driver-supplied display name. May fail per mode.
    fn name(&self) -> Result<String>;
}

/// Input-stream interface of a device.
pub trait VideoInput: Send + Sync {
    /// Enumerate supported display modes.
    fn display_modes(&self) -> Result<Vec<Arc<dyn DisplayMode>>>;

    fn enable_video_input(
        &self,
        mode: DisplayModeId,
        format: PixelFormat,
        flags: VideoInputFlags,
    ) -> Result<()>;

    fn disable_video_input(&self) -> Result<()>;

    fn start_streams(&self) -> Result<()>;

    /// Halt streaming. No further frames are delivered once this returns.
    fn stop_streams(&self) -> Result<()>;

    /// Register (or with `None`, clear) the frame/notification sink.
    fn set_callback(&self, callback: Option<Arc<dyn InputCallback>>) -> Result<()>;
}

/// Sink for frames and format-change notifications.
///
/// Invoked on the driver's delivery thread. Implementations must not
/// panic and must return quickly.
pub trait InputCallback: Send + Sync {
    fn video_input_format_changed(
        &self,
        events: FormatChangedEvents,
        new_mode: &dyn DisplayMode,
        detected: DetectedSignalFlags,
    );

    fn video_input_frame_arrived(
        &self,
        frame: Option<&dyn VideoFrame>,
        audio: Option<&dyn AudioInputPacket>,
    );
}

/// Read access to a video frame.
pub trait VideoFrame {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn row_bytes(&self) -> u32;
    fn pixel_format(&self) -> PixelFormat;
    fn flags(&self) -> FrameFlags;
    fn bytes(&self) -> &[u8];

    /// Embedded timecode of the given kind, if the signal carries one.
    fn timecode(&self, _format: TimecodeFormat) -> Option<Timecode> {
        None
    }
}

/// Audio delivered alongside a video frame.
pub trait AudioInputPacket {
    fn sample_frame_count(&self) -> usize;
    fn bytes(&self) -> &[u8];
}

/// Converts an arriving frame of any pixel format into 8-bit BGRA.
pub trait FrameConverter: Send + Sync {
    fn convert_frame(&self, source: &dyn VideoFrame, destination: &mut VideoFrameBgra)
        -> Result<()>;
}
