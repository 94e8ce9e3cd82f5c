use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::capture::sdk::types::DisplayModeId;
use crate::settings::types::CaptureSettings;

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent capture settings backed by a JSON file.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<CaptureSettings>,
}

impl SettingsStore {
    /// Create a new store, loading from disk if the file exists.
    ///
    /// An unreadable file is logged and replaced by defaults.
    pub fn new(path: PathBuf) -> Self {
        let data = Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load {}, using defaults: {e}", path.display());
            CaptureSettings::default()
        });
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Load settings from a JSON file, returning default on missing file.
    pub fn load(path: &Path) -> Result<CaptureSettings, SettingsError> {
        if !path.exists() {
            return Ok(CaptureSettings::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save current settings to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<(), SettingsError> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("Saved capture settings to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> CaptureSettings {
        self.data.lock().clone()
    }

    pub fn set_default_mode(&self, mode: DisplayModeId) {
        self.data.lock().default_mode = mode;
    }

    pub fn set_format_detection(&self, enabled: bool) {
        self.data.lock().format_detection = enabled;
    }

    /// Set or clear the preferred mode of device `ordinal`.
    pub fn set_device_mode(&self, ordinal: u8, mode: Option<DisplayModeId>) {
        self.data.lock().devices.entry(ordinal).or_default().mode = mode;
    }

    /// Remove all saved settings for a device.
    pub fn remove_device(&self, ordinal: u8) {
        self.data.lock().devices.remove(&ordinal);
    }

    /// Restore defaults in memory.
    pub fn reset(&self) {
        *self.data.lock() = CaptureSettings::default();
    }
}
