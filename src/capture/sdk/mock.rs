//! Simulated capture-card driver for testing without hardware.
//!
//! Uses a builder pattern to configure devices, display modes, attribute
//! availability, and error injection. Tests drive the "hardware side"
//! through [`MockDevice::deliver_frame`], [`MockDevice::signal_format_change`]
//! and [`MockDiscovery::attach`] / [`MockDiscovery::detach`], which invoke the
//! registered callbacks exactly as the driver's delivery thread would.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::capture::error::{CaptureError, Result};
use crate::capture::frame::VideoFrameBgra;
use crate::capture::modes::display_mode_string;

use super::api::{
    AudioInputPacket, CaptureApi, Device, DeviceNotificationCallback, DiscoverySession,
    DisplayMode, FrameConverter, InputCallback, VideoFrame, VideoInput,
};
use super::types::{
    DetectedSignalFlags, DisplayModeId, FormatChangedEvents, FrameFlags, PixelFormat, Timecode,
    TimecodeFormat, VideoInputFlags,
};

/// Configurable error injection for a specific operation.
#[derive(Debug, Clone)]
struct ErrorInjection {
    operation: &'static str,
    error: CaptureError,
}

/// Pop the first injected error for `operation`, if any.
fn take_error(injections: &mut Vec<ErrorInjection>, operation: &str) -> Result<()> {
    if let Some(pos) = injections.iter().position(|e| e.operation == operation) {
        return Err(injections.remove(pos).error);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Driver entry point
// ---------------------------------------------------------------------------

/// Mock driver entry point.
///
/// Operation names for error injection: `"create_discovery"`,
/// `"create_video_converter"`.
pub struct MockCaptureApi {
    discovery: Arc<MockDiscovery>,
    converter: Arc<MockConverter>,
    error_injections: Mutex<Vec<ErrorInjection>>,
}

impl MockCaptureApi {
    /// Create a driver with no devices attached.
    pub fn new() -> Self {
        Self {
            discovery: Arc::new(MockDiscovery::new()),
            converter: Arc::new(MockConverter::new()),
            error_injections: Mutex::new(Vec::new()),
        }
    }

    /// Attach a device that is present before discovery starts.
    pub fn with_device(self, device: MockDevice) -> Self {
        self.discovery.state.lock().devices.push(device);
        self
    }

    /// Inject a one-shot error for an operation name.
    pub fn with_error(self, operation: &'static str, error: CaptureError) -> Self {
        self.error_injections
            .lock()
            .push(ErrorInjection { operation, error });
        self
    }

    /// The enumeration session handed out by `create_discovery`.
    pub fn discovery(&self) -> Arc<MockDiscovery> {
        Arc::clone(&self.discovery)
    }

    /// The converter handed out by `create_video_converter`.
    pub fn converter(&self) -> Arc<MockConverter> {
        Arc::clone(&self.converter)
    }
}

impl Default for MockCaptureApi {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureApi for MockCaptureApi {
    fn create_discovery(&self) -> Result<Arc<dyn DiscoverySession>> {
        take_error(&mut self.error_injections.lock(), "create_discovery")?;
        Ok(self.discovery.clone())
    }

    fn create_video_converter(&self) -> Result<Arc<dyn FrameConverter>> {
        take_error(&mut self.error_injections.lock(), "create_video_converter")?;
        Ok(self.converter.clone())
    }
}

// ---------------------------------------------------------------------------
// Discovery session
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DiscoveryState {
    devices: Vec<MockDevice>,
    callback: Option<Arc<dyn DeviceNotificationCallback>>,
    error_injections: Vec<ErrorInjection>,
}

/// Mock enumeration session.
///
/// Operation names: `"install_device_notifications"`,
/// `"uninstall_device_notifications"`.
pub struct MockDiscovery {
    state: Mutex<DiscoveryState>,
}

impl MockDiscovery {
    fn new() -> Self {
        Self {
            state: Mutex::new(DiscoveryState::default()),
        }
    }

    /// Plug in a device. Notifies the installed callback, if any.
    pub fn attach(&self, device: MockDevice) {
        let callback = {
            let mut state = self.state.lock();
            state.devices.push(device.clone());
            state.callback.clone()
        };
        if let Some(cb) = callback {
            cb.device_arrived(Arc::new(device));
        }
    }

    /// Unplug the device at `position`. The device starts failing driver
    /// calls and the installed callback, if any, is notified.
    pub fn detach(&self, position: usize) -> Option<MockDevice> {
        let (device, callback) = {
            let mut state = self.state.lock();
            if position >= state.devices.len() {
                return None;
            }
            (state.devices.remove(position), state.callback.clone())
        };
        device.mark_removed();
        if let Some(cb) = callback {
            cb.device_removed(Arc::new(device.clone()));
        }
        Some(device)
    }

    /// Whether a notification callback is currently installed.
    pub fn is_installed(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// Inject a one-shot error for an operation name.
    pub fn fail_next(&self, operation: &'static str, error: CaptureError) {
        self.state
            .lock()
            .error_injections
            .push(ErrorInjection { operation, error });
    }
}

impl DiscoverySession for MockDiscovery {
    fn install_device_notifications(
        &self,
        callback: Arc<dyn DeviceNotificationCallback>,
    ) -> Result<()> {
        let present = {
            let mut state = self.state.lock();
            take_error(&mut state.error_injections, "install_device_notifications")?;
            state.callback = Some(Arc::clone(&callback));
            state.devices.clone()
        };
        for device in present {
            callback.device_arrived(Arc::new(device));
        }
        Ok(())
    }

    fn uninstall_device_notifications(&self) -> Result<()> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "uninstall_device_notifications")?;
        state.callback = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A simulated display mode.
#[derive(Debug, Clone)]
pub struct MockDisplayMode {
    mode: DisplayModeId,
    width: u32,
    height: u32,
    name: Option<String>,
}

impl MockDisplayMode {
    pub fn new(mode: DisplayModeId, width: u32, height: u32) -> Self {
        let name = match display_mode_string(mode) {
            "" => mode.code(),
            s => s.trim_start_matches("Mode ").to_string(),
        };
        Self {
            mode,
            width,
            height,
            name: Some(name),
        }
    }

    fn unnamed(mode: DisplayModeId, width: u32, height: u32) -> Self {
        Self {
            name: None,
            ..Self::new(mode, width, height)
        }
    }
}

impl DisplayMode for MockDisplayMode {
    fn mode_id(&self) -> DisplayModeId {
        self.mode
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn name(&self) -> Result<String> {
        self.name
            .clone()
            .ok_or_else(|| CaptureError::Sdk(format!("no name for mode {}", self.mode)))
    }
}

/// Input configuration last passed to `enable_video_input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledInput {
    pub mode: DisplayModeId,
    pub format: PixelFormat,
    pub flags: VideoInputFlags,
}

struct DeviceState {
    name: Option<String>,
    sub_device_index: Option<i64>,
    format_detection: Option<bool>,
    has_input: bool,
    modes: Vec<MockDisplayMode>,
    enabled: Option<EnabledInput>,
    streaming: bool,
    callback: Option<Arc<dyn InputCallback>>,
    removed: bool,
    calls: Vec<&'static str>,
    error_injections: Vec<ErrorInjection>,
}

/// A simulated capture device. Clones share the same hardware state.
///
/// Operation names for error injection: `"display_name"`,
/// `"sub_device_index"`, `"supports_input_format_detection"`,
/// `"video_input"`, `"display_modes"`, `"enable_video_input"`,
/// `"disable_video_input"`, `"start_streams"`, `"stop_streams"`,
/// `"set_callback"`.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// A named device at sub-device index 0, without format detection,
    /// with an input interface and no modes.
    pub fn new(name: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                name: Some(name.to_string()),
                sub_device_index: Some(0),
                format_detection: Some(false),
                has_input: true,
                modes: Vec::new(),
                enabled: None,
                streaming: false,
                callback: None,
                removed: false,
                calls: Vec::new(),
                error_injections: Vec::new(),
            })),
        }
    }

    pub fn with_sub_device_index(self, index: i64) -> Self {
        self.state.lock().sub_device_index = Some(index);
        self
    }

    /// Make the sub-device index attribute unreadable.
    pub fn without_sub_device_index(self) -> Self {
        self.state.lock().sub_device_index = None;
        self
    }

    pub fn with_format_detection(self, supported: bool) -> Self {
        self.state.lock().format_detection = Some(supported);
        self
    }

    /// Make the format-detection attribute unreadable.
    pub fn without_format_detection_attribute(self) -> Self {
        self.state.lock().format_detection = None;
        self
    }

    /// Make the display name unreadable.
    pub fn without_name(self) -> Self {
        self.state.lock().name = None;
        self
    }

    /// Remove the input-stream interface.
    pub fn without_input(self) -> Self {
        self.state.lock().has_input = false;
        self
    }

    pub fn with_mode(self, mode: DisplayModeId, width: u32, height: u32) -> Self {
        self.state
            .lock()
            .modes
            .push(MockDisplayMode::new(mode, width, height));
        self
    }

    /// Add a mode whose name lookup fails.
    pub fn with_unnamed_mode(self, mode: DisplayModeId, width: u32, height: u32) -> Self {
        self.state
            .lock()
            .modes
            .push(MockDisplayMode::unnamed(mode, width, height));
        self
    }

    /// Add the common HD modes: 1080p23.98, 1080p25, 720p50, 720p60.
    pub fn with_hd_modes(self) -> Self {
        self.with_mode(DisplayModeId::HD1080P_2398, 1920, 1080)
            .with_mode(DisplayModeId::HD1080P_25, 1920, 1080)
            .with_mode(DisplayModeId::HD720P_50, 1280, 720)
            .with_mode(DisplayModeId::HD720P_60, 1280, 720)
    }

    pub fn with_error(self, operation: &'static str, error: CaptureError) -> Self {
        self.fail_next(operation, error);
        self
    }

    /// Inject a one-shot error for an operation name.
    pub fn fail_next(&self, operation: &'static str, error: CaptureError) {
        self.state
            .lock()
            .error_injections
            .push(ErrorInjection { operation, error });
    }

    /// Simulate the hardware being unplugged.
    pub fn mark_removed(&self) {
        self.state.lock().removed = true;
    }

    /// Input configuration currently enabled, if any.
    pub fn enabled_input(&self) -> Option<EnabledInput> {
        self.state.lock().enabled
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    pub fn has_callback(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// Names of input-stream operations invoked so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Deliver a frame to the registered sink, as the driver thread would.
    ///
    /// Returns `false` when the device is not streaming or has no sink.
    pub fn deliver_frame(&self, frame: &MockFrame) -> bool {
        self.deliver(Some(frame), None)
    }

    pub fn deliver_frame_with_audio(&self, frame: &MockFrame, audio: &MockAudioPacket) -> bool {
        self.deliver(Some(frame), Some(audio))
    }

    /// Deliver a callback with no frame attached.
    pub fn deliver_empty(&self) -> bool {
        self.deliver(None, None)
    }

    fn deliver(&self, frame: Option<&MockFrame>, audio: Option<&MockAudioPacket>) -> bool {
        let Some(callback) = self.streaming_callback() else {
            return false;
        };
        callback.video_input_frame_arrived(
            frame.map(|f| f as &dyn VideoFrame),
            audio.map(|a| a as &dyn AudioInputPacket),
        );
        true
    }

    /// Report a detected signal change to the registered sink.
    ///
    /// Returns `false` when there is no sink.
    pub fn signal_format_change(
        &self,
        mode: DisplayModeId,
        width: u32,
        height: u32,
        detected: DetectedSignalFlags,
    ) -> bool {
        let callback = self.state.lock().callback.clone();
        let Some(callback) = callback else {
            return false;
        };
        let new_mode = MockDisplayMode::new(mode, width, height);
        callback.video_input_format_changed(
            FormatChangedEvents::DISPLAY_MODE_CHANGED,
            &new_mode,
            detected,
        );
        true
    }

    fn streaming_callback(&self) -> Option<Arc<dyn InputCallback>> {
        let state = self.state.lock();
        if !state.streaming {
            return None;
        }
        state.callback.clone()
    }

    /// Record the call, then apply error injection and removal.
    fn begin(&self, operation: &'static str) -> Result<parking_lot::MutexGuard<'_, DeviceState>> {
        let mut state = self.state.lock();
        state.calls.push(operation);
        take_error(&mut state.error_injections, operation)?;
        Ok(state)
    }
}

impl Device for MockDevice {
    fn display_name(&self) -> Result<String> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "display_name")?;
        state
            .name
            .clone()
            .ok_or_else(|| CaptureError::Attribute("display name unavailable".into()))
    }

    fn sub_device_index(&self) -> Result<i64> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "sub_device_index")?;
        state
            .sub_device_index
            .ok_or_else(|| CaptureError::Attribute("sub-device index unavailable".into()))
    }

    fn supports_input_format_detection(&self) -> Result<bool> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "supports_input_format_detection")?;
        state
            .format_detection
            .ok_or_else(|| CaptureError::Attribute("format detection flag unavailable".into()))
    }

    fn video_input(&self) -> Result<Arc<dyn VideoInput>> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "video_input")?;
        if !state.has_input {
            return Err(CaptureError::InputUnavailable(
                state.name.clone().unwrap_or_default(),
            ));
        }
        drop(state);
        Ok(Arc::new(self.clone()))
    }
}

impl VideoInput for MockDevice {
    fn display_modes(&self) -> Result<Vec<Arc<dyn DisplayMode>>> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "display_modes")?;
        Ok(state
            .modes
            .iter()
            .map(|m| Arc::new(m.clone()) as Arc<dyn DisplayMode>)
            .collect())
    }

    fn enable_video_input(
        &self,
        mode: DisplayModeId,
        format: PixelFormat,
        flags: VideoInputFlags,
    ) -> Result<()> {
        let mut state = self.begin("enable_video_input")?;
        if state.removed {
            return Err(CaptureError::DeviceRemoved(
                state.name.clone().unwrap_or_default(),
            ));
        }
        state.enabled = Some(EnabledInput { mode, format, flags });
        Ok(())
    }

    fn disable_video_input(&self) -> Result<()> {
        let mut state = self.begin("disable_video_input")?;
        state.enabled = None;
        Ok(())
    }

    fn start_streams(&self) -> Result<()> {
        let mut state = self.begin("start_streams")?;
        if state.removed {
            return Err(CaptureError::DeviceRemoved(
                state.name.clone().unwrap_or_default(),
            ));
        }
        if state.enabled.is_none() {
            return Err(CaptureError::StartStreams("video input not enabled".into()));
        }
        state.streaming = true;
        Ok(())
    }

    fn stop_streams(&self) -> Result<()> {
        let mut state = self.begin("stop_streams")?;
        state.streaming = false;
        Ok(())
    }

    fn set_callback(&self, callback: Option<Arc<dyn InputCallback>>) -> Result<()> {
        let mut state = self.begin("set_callback")?;
        state.callback = callback;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frames and conversion
// ---------------------------------------------------------------------------

/// A simulated incoming video frame.
#[derive(Debug, Clone)]
pub struct MockFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    flags: FrameFlags,
    data: Vec<u8>,
    timecodes: Vec<(TimecodeFormat, Timecode)>,
}

impl MockFrame {
    /// A 4-byte-per-pixel frame with every byte set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Yuv8,
            flags: FrameFlags::empty(),
            data: vec![value; width as usize * height as usize * 4],
            timecodes: Vec::new(),
        }
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Flag the frame as carrying no input signal.
    pub fn without_input_source(mut self) -> Self {
        self.flags |= FrameFlags::HAS_NO_INPUT_SOURCE;
        self
    }

    pub fn with_timecode(
        mut self,
        format: TimecodeFormat,
        value: Option<&str>,
        user_bits: u32,
    ) -> Self {
        self.timecodes.push((
            format,
            Timecode {
                value: value.map(str::to_string),
                user_bits,
            },
        ));
        self
    }
}

impl VideoFrame for MockFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn row_bytes(&self) -> u32 {
        self.width * 4
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn flags(&self) -> FrameFlags {
        self.flags
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn timecode(&self, format: TimecodeFormat) -> Option<Timecode> {
        self.timecodes
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, tc)| tc.clone())
    }
}

/// A simulated audio packet.
#[derive(Debug, Clone)]
pub struct MockAudioPacket {
    pub samples: usize,
    pub data: Vec<u8>,
}

impl AudioInputPacket for MockAudioPacket {
    fn sample_frame_count(&self) -> usize {
        self.samples
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Default)]
struct ConverterState {
    conversions: u64,
    last_source_format: Option<PixelFormat>,
    error_injections: Vec<ErrorInjection>,
}

/// Mock converter: copies source bytes into the destination.
///
/// Operation name for error injection: `"convert_frame"`.
pub struct MockConverter {
    state: Mutex<ConverterState>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConverterState::default()),
        }
    }

    /// Number of successful conversions.
    pub fn conversions(&self) -> u64 {
        self.state.lock().conversions
    }

    pub fn last_source_format(&self) -> Option<PixelFormat> {
        self.state.lock().last_source_format
    }

    /// Inject a one-shot error for an operation name.
    pub fn fail_next(&self, operation: &'static str, error: CaptureError) {
        self.state
            .lock()
            .error_injections
            .push(ErrorInjection { operation, error });
    }
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConverter for MockConverter {
    fn convert_frame(
        &self,
        source: &dyn VideoFrame,
        destination: &mut VideoFrameBgra,
    ) -> Result<()> {
        let mut state = self.state.lock();
        take_error(&mut state.error_injections, "convert_frame")?;

        if destination.width() != source.width() || destination.height() != source.height() {
            return Err(CaptureError::Conversion(format!(
                "destination {}x{} does not match source {}x{}",
                destination.width(),
                destination.height(),
                source.width(),
                source.height()
            )));
        }

        let src = source.bytes();
        let dst = destination.data_mut();
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);

        state.conversions += 1;
        state.last_source_format = Some(source.pixel_format());
        Ok(())
    }
}
