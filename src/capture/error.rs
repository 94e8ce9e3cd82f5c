use thiserror::Error;

/// Capture subsystem errors.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("device removed: {0}")]
    DeviceRemoved(String),

    #[error("video input interface unavailable: {0}")]
    InputUnavailable(String),

    #[error("invalid display mode index {index} (device has {count} modes)")]
    InvalidModeIndex { index: usize, count: usize },

    #[error("enable video input failed: {0}")]
    EnableInput(String),

    #[error("start streams failed: {0}")]
    StartStreams(String),

    #[error("stop streams failed: {0}")]
    StopStreams(String),

    #[error("input callback registration failed: {0}")]
    Callback(String),

    #[error("attribute query failed: {0}")]
    Attribute(String),

    #[error("discovery unavailable: {0}")]
    Discovery(String),

    #[error("frame conversion failed: {0}")]
    Conversion(String),

    #[error("invalid capture url: {0}")]
    InvalidUrl(String),

    #[error("driver call failed: {0}")]
    Sdk(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CaptureError>;
