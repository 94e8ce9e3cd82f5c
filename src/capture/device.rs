//! Capture device controller.
//!
//! One [`CaptureDevice`] manages the input stream of one physical
//! connector. Frames are converted to BGRA on the driver's delivery
//! thread and handed to a polling consumer through a latest-wins
//! [`FrameMailbox`].
//!
//! Start and stop are expected to be serialised by the caller. Published
//! state (capturing flag, mode, size, rate) is held in atomics so it can
//! be read from any thread without tearing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{CaptureError, Result};
use super::frame::{FrameSize, Timecodes, VideoFrameBgra};
use super::mailbox::{FrameCallback, FrameMailbox};
use super::modes::{self, ModeCatalog};
use super::sdk::api::{
    AudioInputPacket, Device, DisplayMode, FrameConverter, InputCallback, VideoFrame, VideoInput,
};
use super::sdk::types::{
    DetectedSignalFlags, DisplayModeId, FormatChangedEvents, FrameFlags, PixelFormat,
    VideoInputFlags,
};
use crate::diagnostics::stats::{CaptureSnapshot, CaptureStats};

/// Name used when the driver cannot report one.
pub const PLACEHOLDER_NAME: &str = "Unknown capture device";

/// Mode published before the first successful start.
pub const DEFAULT_MODE: DisplayModeId = DisplayModeId::HD1080P_2398;
pub const DEFAULT_SIZE: FrameSize = FrameSize {
    width: 1920,
    height: 1080,
};
pub const DEFAULT_FPS: f32 = 23.98;

/// Pixel format requested by an explicit start.
const CAPTURE_PIXEL_FORMAT: PixelFormat = PixelFormat::Yuv8;

fn pack_size(size: FrameSize) -> u64 {
    (u64::from(size.width) << 32) | u64::from(size.height)
}

fn unpack_size(packed: u64) -> FrameSize {
    FrameSize::new((packed >> 32) as u32, packed as u32)
}

fn log_failure(name: &str, what: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("{name}: {what} failed: {e}");
    }
}

/// State shared between the controller and the driver's delivery thread.
struct DeviceShared {
    name: String,
    input: Arc<dyn VideoInput>,
    converter: Option<Arc<dyn FrameConverter>>,
    modes: ModeCatalog,
    format_detection: bool,

    capturing: AtomicBool,
    mode: AtomicU32,
    size: AtomicU64,
    fps: AtomicU32,

    mailbox: FrameMailbox,
    stats: Mutex<CaptureStats>,
}

impl DeviceShared {
    /// Publish size and rate for `mode`, derived from the catalog and the
    /// static rate table rather than from the hardware.
    fn publish(&self, mode: DisplayModeId) {
        let size = self.modes.buffer_size(mode);
        let fps = modes::frame_rate(mode);
        self.mode.store(mode.0, Ordering::SeqCst);
        self.size.store(pack_size(size), Ordering::SeqCst);
        self.fps.store(fps.to_bits(), Ordering::SeqCst);
    }

    /// Stop, re-enable with the detected mode and format, restart.
    /// Abandoned at the first failing step.
    fn restart(&self, mode: DisplayModeId, format: PixelFormat) -> Result<()> {
        self.input.stop_streams()?;
        self.input
            .enable_video_input(mode, format, VideoInputFlags::ENABLE_FORMAT_DETECTION)?;
        self.input.start_streams()
    }

    /// Publish the restarted mode, unless a stop landed while the restart
    /// was running, in which case the restarted stream is torn down again.
    fn complete_restart(&self, mode: DisplayModeId) {
        if !self.capturing.load(Ordering::SeqCst) {
            tracing::debug!("{}: stopped during format change, halting stream", self.name);
            log_failure(&self.name, "stop streams", self.input.stop_streams());
            log_failure(&self.name, "disable video input", self.input.disable_video_input());
            return;
        }
        self.publish(mode);
        self.stats.lock().record_format_change();
    }
}

impl InputCallback for DeviceShared {
    fn video_input_format_changed(
        &self,
        events: FormatChangedEvents,
        new_mode: &dyn DisplayMode,
        detected: DetectedSignalFlags,
    ) {
        if !self.format_detection {
            tracing::debug!("{}: format change ignored, detection disabled", self.name);
            return;
        }
        if !self.capturing.load(Ordering::SeqCst) {
            return;
        }

        let mode = new_mode.mode_id();
        let format = if detected.contains(DetectedSignalFlags::RGB_444) {
            PixelFormat::Rgb10
        } else {
            PixelFormat::Yuv10
        };
        tracing::info!(
            "{}: input format changed to {mode} ({format:?}, events {:#x})",
            self.name,
            events.bits()
        );

        match self.restart(mode, format) {
            Ok(()) => self.complete_restart(mode),
            Err(e) => {
                tracing::error!("{}: restart after format change failed: {e}", self.name);
                self.stats.lock().record_restart_failure();
            }
        }
    }

    fn video_input_frame_arrived(
        &self,
        frame: Option<&dyn VideoFrame>,
        _audio: Option<&dyn AudioInputPacket>,
    ) {
        let Some(frame) = frame else {
            return;
        };

        if frame.flags().contains(FrameFlags::HAS_NO_INPUT_SOURCE) {
            self.stats.lock().record_ignored();
            tracing::trace!("{}: frame without input source ignored", self.name);
            return;
        }

        let Some(converter) = &self.converter else {
            tracing::trace!("{}: no converter, frame dropped", self.name);
            return;
        };

        let timecodes = Timecodes::from_frame(frame);
        let result = self
            .mailbox
            .write(frame.width(), frame.height(), timecodes, |dest| {
                converter.convert_frame(frame, dest)
            });

        match result {
            Ok(outcome) => {
                if outcome.replaced_unread {
                    tracing::trace!("{}: unread frame overwritten", self.name);
                }
                self.stats
                    .lock()
                    .record_frame(outcome.bytes, outcome.replaced_unread);
            }
            Err(e) => {
                tracing::debug!("{}: frame conversion failed: {e}", self.name);
                self.stats.lock().record_conversion_failure();
            }
        }
    }
}

/// Controller for one capture device.
pub struct CaptureDevice {
    device: Arc<dyn Device>,
    shared: Arc<DeviceShared>,
}

impl CaptureDevice {
    /// Build a controller for `device`.
    ///
    /// Fails only when the device has no input-stream interface. Optional
    /// attributes fall back to defaults. Hardware format detection is used
    /// only if the device supports it and `allow_format_detection` is set.
    pub fn new(
        device: Arc<dyn Device>,
        converter: Option<Arc<dyn FrameConverter>>,
        allow_format_detection: bool,
    ) -> Result<Self> {
        let name = device_name(&*device);

        let input = device.video_input().map_err(|e| {
            tracing::error!("{name}: no video input interface: {e}");
            match e {
                CaptureError::InputUnavailable(_) => e,
                other => CaptureError::InputUnavailable(format!("{name}: {other}")),
            }
        })?;

        let supported = device.supports_input_format_detection().unwrap_or_else(|e| {
            tracing::warn!("{name}: format detection query failed, assuming unsupported: {e}");
            false
        });

        let modes = ModeCatalog::from_input(&*input);
        tracing::debug!("{name}: {} display modes", modes.len());

        let shared = DeviceShared {
            name,
            input,
            converter,
            modes,
            format_detection: supported && allow_format_detection,
            capturing: AtomicBool::new(false),
            mode: AtomicU32::new(DEFAULT_MODE.0),
            size: AtomicU64::new(pack_size(DEFAULT_SIZE)),
            fps: AtomicU32::new(DEFAULT_FPS.to_bits()),
            mailbox: FrameMailbox::new(),
            stats: Mutex::new(CaptureStats::new()),
        };

        Ok(Self {
            device,
            shared: Arc::new(shared),
        })
    }

    /// Start capturing in `mode`. A running capture is stopped first.
    ///
    /// On failure every step already taken is undone and the controller
    /// stays stopped.
    pub fn start(&self, mode: DisplayModeId) -> Result<()> {
        if self.is_capturing() {
            self.stop();
        }

        let name = &self.shared.name;
        let input = &self.shared.input;

        let mut flags = VideoInputFlags::empty();
        if self.shared.format_detection {
            flags |= VideoInputFlags::ENABLE_FORMAT_DETECTION;
        }

        if let Err(e) = input.enable_video_input(mode, CAPTURE_PIXEL_FORMAT, flags) {
            tracing::error!("{name}: enable video input for {mode} failed: {e}");
            return Err(e);
        }

        if let Err(e) = input.start_streams() {
            tracing::error!("{name}: start streams failed: {e}");
            log_failure(name, "disable video input", input.disable_video_input());
            return Err(e);
        }

        let sink: Arc<dyn InputCallback> = self.shared.clone();
        if let Err(e) = input.set_callback(Some(sink)) {
            tracing::error!("{name}: registering input callback failed: {e}");
            log_failure(name, "stop streams", input.stop_streams());
            log_failure(name, "disable video input", input.disable_video_input());
            return Err(e);
        }

        self.shared.stats.lock().reset();
        self.shared.publish(mode);
        self.shared.capturing.store(true, Ordering::SeqCst);
        tracing::info!(
            "{name}: capturing {mode} ({}x{} @ {})",
            self.current_size().width,
            self.current_size().height,
            self.current_fps()
        );
        Ok(())
    }

    /// Start capturing the catalog entry at `index`.
    pub fn start_index(&self, index: usize) -> Result<()> {
        let Some(entry) = self.shared.modes.get(index) else {
            let count = self.shared.modes.len();
            tracing::error!(
                "{}: display mode index {index} out of range ({count} modes)",
                self.shared.name
            );
            return Err(CaptureError::InvalidModeIndex { index, count });
        };
        self.start(entry.mode)
    }

    /// Stop capturing. No-op when already stopped.
    pub fn stop(&self) {
        if !self.shared.capturing.swap(false, Ordering::SeqCst) {
            return;
        }

        let name = &self.shared.name;
        let input = &self.shared.input;
        log_failure(name, "stop streams", input.stop_streams());
        // Releases the input's reference to the shared state.
        log_failure(name, "clear input callback", input.set_callback(None));
        log_failure(name, "disable video input", input.disable_video_input());
        tracing::info!("{name}: capture stopped");
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.capturing.load(Ordering::SeqCst)
    }

    /// Copy out the latest unread frame (and its timecodes, if asked).
    ///
    /// Never blocks on new data: returns `false` at once when nothing new
    /// arrived since the last successful call.
    pub fn get_frame(&self, frame: &mut VideoFrameBgra, timecodes: Option<&mut Timecodes>) -> bool {
        let delivered = self.shared.mailbox.read_into(frame, timecodes);
        if delivered {
            self.shared.stats.lock().record_delivery();
        }
        delivered
    }

    /// Install or clear a callback run on the driver thread for every
    /// converted frame. See [`FrameCallback`] for its constraints.
    pub fn set_frame_callback(&self, callback: Option<FrameCallback>) {
        self.shared.mailbox.set_callback(callback);
    }

    /// Timecodes of the most recent frame, without consuming it.
    pub fn timecodes(&self) -> Timecodes {
        self.shared.mailbox.timecodes()
    }

    pub fn display_mode_names(&self) -> Vec<String> {
        self.shared.modes.names()
    }

    pub fn display_mode_buffer_size(&self, mode: DisplayModeId) -> FrameSize {
        self.shared.modes.buffer_size(mode)
    }

    /// Nominal rate for `mode`, `0.0` when unknown.
    pub fn display_mode_buffer_fps(mode: DisplayModeId) -> f32 {
        modes::frame_rate(mode)
    }

    pub fn modes(&self) -> &ModeCatalog {
        &self.shared.modes
    }

    pub fn current_mode(&self) -> DisplayModeId {
        DisplayModeId(self.shared.mode.load(Ordering::SeqCst))
    }

    pub fn current_size(&self) -> FrameSize {
        unpack_size(self.shared.size.load(Ordering::SeqCst))
    }

    pub fn current_fps(&self) -> f32 {
        f32::from_bits(self.shared.fps.load(Ordering::SeqCst))
    }

    pub fn is_format_detection_enabled(&self) -> bool {
        self.shared.format_detection
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn diagnostics(&self) -> CaptureSnapshot {
        self.shared.stats.lock().snapshot()
    }
}

/// Stops capture on drop.
///
/// If the driver refuses to clear the input callback during that stop, the
/// input keeps its reference to the shared state and neither is freed.
impl Drop for CaptureDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Display name of `device`, or [`PLACEHOLDER_NAME`] if the query fails.
pub fn device_name(device: &dyn Device) -> String {
    device.display_name().unwrap_or_else(|e| {
        tracing::warn!("Device name unavailable, using placeholder: {e}");
        PLACEHOLDER_NAME.to_string()
    })
}
