use serde::Serialize;
use std::time::Instant;

/// Collects capture statistics for one device.
pub struct CaptureStats {
    frame_count: u64,
    drop_count: u64,
    delivered_count: u64,
    ignored_count: u64,
    conversion_failures: u64,
    format_changes: u64,
    restart_failures: u64,
    total_bytes: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
}

/// Snapshot of capture stats for serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub fps: f64,
    pub frame_count: u64,
    pub drop_count: u64,
    pub drop_rate: f64,
    pub delivered_count: u64,
    pub ignored_count: u64,
    pub conversion_failures: u64,
    pub format_changes: u64,
    pub restart_failures: u64,
    pub bandwidth_bps: u64,
    pub ms_since_last_frame: Option<u64>,
}

impl CaptureStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            drop_count: 0,
            delivered_count: 0,
            ignored_count: 0,
            conversion_failures: 0,
            format_changes: 0,
            restart_failures: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            last_frame_time: None,
        }
    }

    /// Record a converted frame. `replaced_unread` means the consumer never
    /// saw the frame it replaced.
    pub fn record_frame(&mut self, bytes: usize, replaced_unread: bool) {
        self.frame_count += 1;
        self.total_bytes += bytes as u64;
        self.last_frame_time = Some(Instant::now());
        if replaced_unread {
            self.drop_count += 1;
        }
    }

    /// Record a frame handed to the polling consumer.
    pub fn record_delivery(&mut self) {
        self.delivered_count += 1;
    }

    /// Record a frame flagged as having no input source.
    pub fn record_ignored(&mut self) {
        self.ignored_count += 1;
    }

    pub fn record_conversion_failure(&mut self) {
        self.conversion_failures += 1;
    }

    pub fn record_format_change(&mut self) {
        self.format_changes += 1;
    }

    pub fn record_restart_failure(&mut self) {
        self.restart_failures += 1;
    }

    /// Arrival rate based on elapsed time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Share of converted frames overwritten before being polled (0.0 - 100.0).
    pub fn drop_rate(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        (self.drop_count as f64 / self.frame_count as f64) * 100.0
    }

    /// Bandwidth in bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Reset all counters. Called when a capture starts.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            fps: self.fps(),
            frame_count: self.frame_count,
            drop_count: self.drop_count,
            drop_rate: self.drop_rate(),
            delivered_count: self.delivered_count,
            ignored_count: self.ignored_count,
            conversion_failures: self.conversion_failures,
            format_changes: self.format_changes,
            restart_failures: self.restart_failures,
            bandwidth_bps: self.bandwidth_bps(),
            ms_since_last_frame: self
                .last_frame_time
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}
