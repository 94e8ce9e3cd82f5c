//! `sdi://` media player.
//!
//! Opens a registered device by URL, starts it in the configured mode and,
//! on every tick, pulls at most one frame into a [`VideoSink`]. Live input
//! only: seeking and looping are unsupported.

use std::sync::Arc;
use std::time::Duration;

use crate::capture::device::CaptureDevice;
use crate::capture::error::{CaptureError, Result};
use crate::capture::frame::{FrameSize, Timecodes, VideoFrameBgra};
use crate::capture::registry::DeviceRegistry;
use crate::capture::url::parse_device_url;
use crate::settings::types::CaptureSettings;

use super::sink::VideoSink;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Closed,
    Playing,
    Paused,
}

/// Polling player over one capture device at a time.
pub struct CapturePlayer<S: VideoSink> {
    registry: Arc<DeviceRegistry>,
    settings: CaptureSettings,
    sink: S,

    device: Option<Arc<CaptureDevice>>,
    url: Option<String>,
    state: MediaState,

    frame: VideoFrameBgra,
    timecodes: Timecodes,
    current_time: Duration,
    frame_rate: f32,
    video_size: FrameSize,
}

impl<S: VideoSink> CapturePlayer<S> {
    pub fn new(registry: Arc<DeviceRegistry>, settings: CaptureSettings, sink: S) -> Self {
        Self {
            registry,
            settings,
            sink,
            device: None,
            url: None,
            state: MediaState::Closed,
            frame: VideoFrameBgra::default(),
            timecodes: Timecodes::default(),
            current_time: Duration::ZERO,
            frame_rate: 0.0,
            video_size: FrameSize::ZERO,
        }
    }

    /// Open `sdi://device<N>` and start capturing.
    ///
    /// An unknown or unresolvable URL fails without touching the current
    /// device. Otherwise the current device is closed first.
    pub fn open(&mut self, url: &str) -> Result<()> {
        let ordinal = parse_device_url(url)?;
        let device = self
            .registry
            .by_ordinal(ordinal)
            .ok_or_else(|| CaptureError::DeviceNotFound(url.to_string()))?;

        self.close();

        let mode = self.settings.mode_for(ordinal);
        device.start(mode)?;

        self.video_size = device.current_size();
        self.frame_rate = device.current_fps();
        self.device = Some(device);
        self.url = Some(url.to_string());
        self.state = MediaState::Playing;
        self.current_time = Duration::ZERO;

        tracing::info!(
            "Opened {url} in {mode} ({}x{} @ {})",
            self.video_size.width,
            self.video_size.height,
            self.frame_rate
        );
        Ok(())
    }

    /// Stop the open device and return to [`MediaState::Closed`].
    pub fn close(&mut self) {
        if let Some(device) = self.device.take() {
            device.stop();
            device.set_frame_callback(None);
            tracing::info!("Closed {}", self.url.as_deref().unwrap_or_default());
        }
        self.url = None;
        self.state = MediaState::Closed;
        self.current_time = Duration::ZERO;
        self.frame_rate = 0.0;
        self.video_size = FrameSize::ZERO;
    }

    /// Advance by `delta` and push the latest unread frame, if any, to the
    /// sink. The sink is re-initialised whenever the frame size changes.
    ///
    /// Returns whether a frame was pushed.
    pub fn tick_video(&mut self, delta: Duration) -> bool {
        if self.state != MediaState::Playing {
            return false;
        }
        let Some(device) = &self.device else {
            return false;
        };

        self.current_time += delta;

        if !device.get_frame(&mut self.frame, Some(&mut self.timecodes)) {
            return false;
        }

        let size = self.frame.size();
        if self.sink.dimensions() != size {
            if !self.sink.initialize(size) {
                tracing::warn!(
                    "Video sink rejected {}x{}, frame skipped",
                    size.width,
                    size.height
                );
                return false;
            }
            tracing::debug!("Video sink initialised for {}x{}", size.width, size.height);
            self.video_size = size;
        }

        self.sink.update(&self.frame);
        true
    }

    /// `0.0` pauses, `1.0` plays. Any other rate is rejected.
    pub fn set_rate(&mut self, rate: f32) -> bool {
        if self.device.is_none() || !Self::supports_rate(rate) {
            return false;
        }
        self.state = if rate == 0.0 {
            MediaState::Paused
        } else {
            MediaState::Playing
        };
        true
    }

    pub fn supports_rate(rate: f32) -> bool {
        rate == 0.0 || rate == 1.0
    }

    pub fn rate(&self) -> f32 {
        match self.state {
            MediaState::Playing => 1.0,
            MediaState::Closed | MediaState::Paused => 0.0,
        }
    }

    /// Live input cannot seek.
    pub fn seek(&mut self, _time: Duration) -> bool {
        false
    }

    /// Live input cannot loop.
    pub fn set_looping(&mut self, _looping: bool) -> bool {
        false
    }

    pub fn state(&self) -> MediaState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }

    /// Nominal rate of the open device's mode.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn video_size(&self) -> FrameSize {
        self.video_size
    }

    /// Timecodes of the last frame pushed to the sink.
    pub fn timecodes(&self) -> &Timecodes {
        &self.timecodes
    }

    pub fn device(&self) -> Option<&Arc<CaptureDevice>> {
        self.device.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: VideoSink> Drop for CapturePlayer<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sdk::mock::{MockConverter, MockDevice, MockFrame};
    use crate::capture::sdk::types::{DisplayModeId, TimecodeFormat};
    use crate::player::sink::MemorySink;
    use crate::settings::types::DeviceSettings;

    struct Rig {
        devices: Vec<MockDevice>,
        registry: Arc<DeviceRegistry>,
    }

    fn rig() -> Rig {
        let registry = Arc::new(DeviceRegistry::new(
            Some(Arc::new(MockConverter::new())),
            true,
        ));
        let devices: Vec<MockDevice> = (0..3)
            .map(|i| MockDevice::new(&format!("Input {i}")).with_hd_modes())
            .collect();
        for (i, device) in devices.iter().enumerate() {
            registry.device_arrived(Arc::new(device.clone()), i);
        }
        Rig { devices, registry }
    }

    fn player(rig: &Rig) -> CapturePlayer<MemorySink> {
        CapturePlayer::new(
            Arc::clone(&rig.registry),
            CaptureSettings::default(),
            MemorySink::new(),
        )
    }

    #[test]
    fn open_starts_device_in_default_mode() {
        let rig = rig();
        let mut player = player(&rig);

        player.open("sdi://device2").unwrap();

        assert_eq!(player.state(), MediaState::Playing);
        assert_eq!(player.url(), Some("sdi://device2"));
        assert!(rig.devices[1].is_streaming());
        assert_eq!(
            rig.devices[1].enabled_input().unwrap().mode,
            DisplayModeId::HD1080P_2398
        );
        assert_eq!(player.frame_rate(), 23.98);
    }

    #[test]
    fn open_uses_per_device_mode() {
        let rig = rig();
        let mut settings = CaptureSettings::default();
        settings.devices.insert(
            3,
            DeviceSettings {
                mode: Some(DisplayModeId::HD720P_50),
            },
        );
        let mut player = CapturePlayer::new(Arc::clone(&rig.registry), settings, MemorySink::new());

        player.open("sdi://device3").unwrap();
        assert_eq!(player.video_size(), FrameSize::new(1280, 720));
        assert_eq!(player.frame_rate(), 50.0);
    }

    #[test]
    fn open_out_of_range_fails_without_state_change() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();

        assert!(matches!(
            player.open("sdi://device9"),
            Err(CaptureError::DeviceNotFound(_))
        ));
        assert!(player.open("rtsp://camera").is_err());
        assert_eq!(player.url(), Some("sdi://device1"));
        assert!(rig.devices[0].is_streaming());
    }

    #[test]
    fn open_switches_devices() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();
        player.open("sdi://device3").unwrap();

        assert!(!rig.devices[0].is_streaming());
        assert!(rig.devices[2].is_streaming());
    }

    #[test]
    fn failed_start_leaves_player_closed() {
        let rig = rig();
        let mut player = player(&rig);
        rig.devices[0].fail_next("enable_video_input", CaptureError::EnableInput("busy".into()));

        assert!(player.open("sdi://device1").is_err());
        assert_eq!(player.state(), MediaState::Closed);
        assert!(player.url().is_none());
    }

    #[test]
    fn tick_pushes_frames_and_reinitialises_on_resize() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();
        let delta = Duration::from_millis(40);

        assert!(!player.tick_video(delta));

        rig.devices[0].deliver_frame(&MockFrame::filled(4, 4, 1));
        assert!(player.tick_video(delta));
        assert_eq!(player.sink().dimensions(), FrameSize::new(4, 4));
        assert!(player.sink().frame().data().iter().all(|&b| b == 1));

        rig.devices[0].deliver_frame(&MockFrame::filled(4, 4, 2));
        assert!(player.tick_video(delta));
        assert_eq!(player.sink().initializations(), 1);

        rig.devices[0].deliver_frame(&MockFrame::filled(2, 2, 3));
        assert!(player.tick_video(delta));
        assert_eq!(player.sink().initializations(), 2);
        assert_eq!(player.video_size(), FrameSize::new(2, 2));
        assert_eq!(player.sink().updates(), 3);
        assert_eq!(player.current_time(), delta * 4);
    }

    #[test]
    fn tick_carries_timecodes() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();

        rig.devices[0].deliver_frame(&MockFrame::filled(2, 2, 0).with_timecode(
            TimecodeFormat::Rp188Vitc1,
            Some("12:00:00:00"),
            0,
        ));
        assert!(player.tick_video(Duration::from_millis(20)));
        assert_eq!(player.timecodes().rp188_vitc1_timecode, "12:00:00:00");
    }

    #[test]
    fn pause_stops_ticking() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();

        assert!(player.set_rate(0.0));
        assert_eq!(player.state(), MediaState::Paused);
        assert_eq!(player.rate(), 0.0);
        rig.devices[0].deliver_frame(&MockFrame::filled(2, 2, 1));
        assert!(!player.tick_video(Duration::from_millis(20)));
        assert_eq!(player.current_time(), Duration::ZERO);

        assert!(player.set_rate(1.0));
        assert!(player.tick_video(Duration::from_millis(20)));
    }

    #[test]
    fn unsupported_rates_and_seeking_are_rejected() {
        let rig = rig();
        let mut player = player(&rig);
        assert!(!player.set_rate(1.0));

        player.open("sdi://device1").unwrap();
        assert!(!player.set_rate(2.0));
        assert!(!CapturePlayer::<MemorySink>::supports_rate(-1.0));
        assert!(!player.seek(Duration::from_secs(1)));
        assert!(!player.set_looping(true));
        assert_eq!(player.state(), MediaState::Playing);
    }

    #[test]
    fn close_stops_device() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device2").unwrap();

        player.close();
        assert_eq!(player.state(), MediaState::Closed);
        assert!(!rig.devices[1].is_streaming());
        assert!(!player.tick_video(Duration::from_millis(20)));
        player.close();
    }

    #[test]
    fn drop_closes_device() {
        let rig = rig();
        let mut player = player(&rig);
        player.open("sdi://device1").unwrap();
        drop(player);
        assert!(!rig.devices[0].is_streaming());
    }
}
