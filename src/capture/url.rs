//! `sdi://device<N>` addressing.
//!
//! `N` is a 1-based ordinal into the registry's device table, ordered by
//! sub-device index.

use serde::{Deserialize, Serialize};

use super::error::{CaptureError, Result};

pub const SCHEME: &str = "sdi://";
const DEVICE_PREFIX: &str = "sdi://device";

/// Highest device id a media source may name.
pub const MAX_DEVICE_ID: u8 = 8;

/// Parse `sdi://device<N>` into the 1-based ordinal `N`.
pub fn parse_device_url(url: &str) -> Result<usize> {
    let digits = url
        .strip_prefix(DEVICE_PREFIX)
        .ok_or_else(|| CaptureError::InvalidUrl(url.to_string()))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CaptureError::InvalidUrl(url.to_string()));
    }

    match digits.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CaptureError::InvalidUrl(url.to_string())),
    }
}

/// Build the URL for 1-based ordinal `n`.
pub fn device_url(n: usize) -> String {
    format!("{DEVICE_PREFIX}{n}")
}

/// Whether `url` uses the capture scheme at all.
pub fn is_capture_url(url: &str) -> bool {
    url.starts_with(SCHEME)
}

/// A persisted capture source naming one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdiSource {
    pub device_id: u8,
}

impl Default for SdiSource {
    fn default() -> Self {
        Self { device_id: 1 }
    }
}

impl SdiSource {
    pub fn new(device_id: u8) -> Result<Self> {
        let source = Self { device_id };
        source.validate()?;
        Ok(source)
    }

    pub fn url(&self) -> String {
        device_url(usize::from(self.device_id))
    }

    /// Device ids are limited to `1..=MAX_DEVICE_ID`.
    pub fn validate(&self) -> Result<()> {
        if (1..=MAX_DEVICE_ID).contains(&self.device_id) {
            Ok(())
        } else {
            Err(CaptureError::InvalidUrl(format!(
                "device id {} outside 1..={MAX_DEVICE_ID}",
                self.device_id
            )))
        }
    }
}
