//! Frame destination for [`CapturePlayer`](super::session::CapturePlayer).

use crate::capture::frame::{FrameSize, VideoFrameBgra};

/// Receives BGRA frames from the player's tick.
pub trait VideoSink {
    /// (Re)allocate for frames of `size`. Returns `false` if the sink
    /// cannot accept that size.
    fn initialize(&mut self, size: FrameSize) -> bool;

    /// Size the sink is currently initialised for.
    fn dimensions(&self) -> FrameSize;

    /// Consume one frame matching [`dimensions`](Self::dimensions).
    fn update(&mut self, frame: &VideoFrameBgra);
}

/// Sink that keeps a copy of the last frame in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    size: FrameSize,
    frame: VideoFrameBgra,
    initializations: u32,
    updates: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &VideoFrameBgra {
        &self.frame
    }

    /// Number of times the sink was (re)initialised.
    pub fn initializations(&self) -> u32 {
        self.initializations
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl VideoSink for MemorySink {
    fn initialize(&mut self, size: FrameSize) -> bool {
        if size.is_zero() {
            return false;
        }
        self.size = size;
        self.frame = VideoFrameBgra::new(size.width, size.height);
        self.initializations += 1;
        true
    }

    fn dimensions(&self) -> FrameSize {
        self.size
    }

    fn update(&mut self, frame: &VideoFrameBgra) {
        self.frame.clone_from(frame);
        self.updates += 1;
    }
}
