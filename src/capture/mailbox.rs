//! Single-slot frame hand-off between the driver thread and the poller.
//!
//! A new frame replaces the previous one whether or not it was read;
//! there is no queue. Every write and every read happens under one lock,
//! so a reader never observes a partially written buffer.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::Result;
use super::frame::{Timecodes, VideoFrameBgra};

/// Per-frame consumer callback.
///
/// Runs on the driver thread while the mailbox lock is held. It must not
/// block and must not call back into the mailbox.
pub type FrameCallback = Arc<dyn Fn(&VideoFrameBgra) + Send + Sync>;

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// An unread frame was overwritten.
    pub replaced_unread: bool,
    pub bytes: usize,
}

#[derive(Default)]
struct Slot {
    frame: VideoFrameBgra,
    timecodes: Timecodes,
    unread: bool,
    callback: Option<FrameCallback>,
}

/// Latest-wins frame mailbox.
#[derive(Default)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or clear the per-frame consumer callback.
    pub fn set_callback(&self, callback: Option<FrameCallback>) {
        self.slot.lock().callback = callback;
    }

    /// Write a new `width x height` frame produced by `fill`.
    ///
    /// The slot is only replaced if `fill` succeeds; on error the previous
    /// frame and its unread flag are left as they were.
    pub fn write<F>(
        &self,
        width: u32,
        height: u32,
        timecodes: Timecodes,
        fill: F,
    ) -> Result<WriteOutcome>
    where
        F: FnOnce(&mut VideoFrameBgra) -> Result<()>,
    {
        let mut slot = self.slot.lock();

        let mut frame = VideoFrameBgra::new(width, height);
        fill(&mut frame)?;

        let outcome = WriteOutcome {
            replaced_unread: slot.unread,
            bytes: frame.data().len(),
        };
        slot.frame = frame;
        slot.timecodes = timecodes;
        slot.unread = true;

        if let Some(callback) = &slot.callback {
            callback(&slot.frame);
        }

        Ok(outcome)
    }

    /// Copy the unread frame (and optionally its timecodes) out and clear
    /// the unread flag. Returns `false` immediately when there is nothing
    /// new.
    pub fn read_into(&self, frame: &mut VideoFrameBgra, timecodes: Option<&mut Timecodes>) -> bool {
        let mut slot = self.slot.lock();
        if !slot.unread {
            return false;
        }
        slot.unread = false;

        frame.clone_from(&slot.frame);
        if let Some(out) = timecodes {
            out.clone_from(&slot.timecodes);
        }
        true
    }

    pub fn has_unread(&self) -> bool {
        self.slot.lock().unread
    }

    /// Timecodes of the most recent frame, without consuming it.
    pub fn timecodes(&self) -> Timecodes {
        self.slot.lock().timecodes.clone()
    }
}
