//! Device registry and capture-system owner.
//!
//! [`DeviceRegistry`] builds a controller for every arriving device and
//! keeps them ordered by sub-device index. [`CaptureSystem`] wires one
//! [`DeviceDiscovery`] to one registry and tears both down in order.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::device::CaptureDevice;
use super::discovery::DeviceDiscovery;
use super::error::{CaptureError, Result};
use super::sdk::api::{CaptureApi, Device, FrameConverter};
use super::url::parse_device_url;

/// Controllers keyed by sub-device index.
pub struct DeviceRegistry {
    converter: Option<Arc<dyn FrameConverter>>,
    allow_format_detection: bool,
    devices: Mutex<BTreeMap<usize, Arc<CaptureDevice>>>,
}

impl DeviceRegistry {
    pub fn new(converter: Option<Arc<dyn FrameConverter>>, allow_format_detection: bool) -> Self {
        Self {
            converter,
            allow_format_detection,
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    /// Build and register a controller for `device`.
    ///
    /// Called from the driver's notification thread. A device that cannot
    /// be controlled is logged and skipped. A device arriving at an index
    /// already in use replaces the previous controller, which is stopped.
    pub fn device_arrived(&self, device: Arc<dyn Device>, index: usize) {
        let controller = match CaptureDevice::new(
            device,
            self.converter.clone(),
            self.allow_format_detection,
        ) {
            Ok(controller) => Arc::new(controller),
            Err(e) => {
                tracing::error!("Skipping capture device at index {index}: {e}");
                return;
            }
        };

        let name = controller.name().to_string();
        let previous = self.devices.lock().insert(index, controller);
        if let Some(previous) = previous {
            tracing::warn!(
                "Capture device at index {index} replaced: {} -> {name}",
                previous.name()
            );
            previous.stop();
        } else {
            tracing::info!("Registered capture device {name} at index {index}");
        }
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    /// Controller at sub-device index `index`.
    pub fn get(&self, index: usize) -> Option<Arc<CaptureDevice>> {
        self.devices.lock().get(&index).cloned()
    }

    /// Controller at 1-based position `ordinal` in index order.
    ///
    /// Gaps in the sub-device indices are skipped: with indices 0, 1 and 4,
    /// ordinal 3 is the device at index 4.
    pub fn by_ordinal(&self, ordinal: usize) -> Option<Arc<CaptureDevice>> {
        let position = ordinal.checked_sub(1)?;
        self.devices.lock().values().nth(position).cloned()
    }

    /// All controllers in index order.
    pub fn devices(&self) -> Vec<Arc<CaptureDevice>> {
        self.devices.lock().values().cloned().collect()
    }

    /// Resolve `sdi://device<N>` to a 0-based table position.
    pub fn resolve_url(&self, url: &str) -> Result<usize> {
        let ordinal = parse_device_url(url)?;
        let count = self.len();
        if ordinal > count {
            return Err(CaptureError::DeviceNotFound(format!(
                "{url} ({count} devices registered)"
            )));
        }
        Ok(ordinal - 1)
    }

    /// Controller addressed by `url`.
    pub fn device_for_url(&self, url: &str) -> Result<Arc<CaptureDevice>> {
        let ordinal = parse_device_url(url)?;
        self.by_ordinal(ordinal)
            .ok_or_else(|| CaptureError::DeviceNotFound(url.to_string()))
    }

    /// Stop and drop every controller.
    pub fn shutdown(&self) {
        let devices = std::mem::take(&mut *self.devices.lock());
        for controller in devices.values() {
            controller.stop();
        }
        tracing::debug!("Capture registry cleared ({} devices)", devices.len());
    }
}

/// Explicitly owned capture stack: one discovery session feeding one
/// registry.
pub struct CaptureSystem {
    discovery: DeviceDiscovery,
    registry: Arc<DeviceRegistry>,
}

impl CaptureSystem {
    /// Start discovery and register every present and future device.
    pub fn new(api: &dyn CaptureApi, allow_format_detection: bool) -> Result<Self> {
        let mut discovery = DeviceDiscovery::new(api);
        let registry = Arc::new(DeviceRegistry::new(
            discovery.converter(),
            allow_format_detection,
        ));

        let sink = Arc::clone(&registry);
        discovery.install(Box::new(move |device, index| {
            sink.device_arrived(device, index);
        }))?;

        Ok(Self {
            discovery,
            registry,
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn is_discovery_enabled(&self) -> bool {
        self.discovery.is_enabled()
    }

    /// Uninstall notifications, then stop and release every controller.
    pub fn shutdown(&mut self) {
        self.discovery.shutdown();
        self.registry.shutdown();
    }
}

impl Drop for CaptureSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::sdk::mock::{MockCaptureApi, MockConverter, MockDevice};
    use crate::capture::sdk::types::DisplayModeId;

    fn three_device_api() -> MockCaptureApi {
        MockCaptureApi::new()
            .with_device(MockDevice::new("Input C").with_sub_device_index(4).with_hd_modes())
            .with_device(MockDevice::new("Input A").with_sub_device_index(0).with_hd_modes())
            .with_device(MockDevice::new("Input B").with_sub_device_index(1).with_hd_modes())
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Some(Arc::new(MockConverter::new())), true)
    }

    #[test]
    fn devices_are_ordered_by_index() {
        let system = CaptureSystem::new(&three_device_api(), true).unwrap();
        let names: Vec<String> = system
            .registry()
            .devices()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["Input A", "Input B", "Input C"]);
        assert_eq!(system.registry().get(4).unwrap().name(), "Input C");
    }

    #[test]
    fn url_resolves_to_zero_based_position() {
        let system = CaptureSystem::new(&three_device_api(), true).unwrap();
        let registry = system.registry();

        assert_eq!(registry.resolve_url("sdi://device2").unwrap(), 1);
        assert_eq!(
            registry.device_for_url("sdi://device2").unwrap().name(),
            "Input B"
        );
        assert!(matches!(
            registry.resolve_url("sdi://device9"),
            Err(CaptureError::DeviceNotFound(_))
        ));
        assert!(registry.device_for_url("sdi://device9").is_err());
        assert!(matches!(
            registry.resolve_url("sdi://device0"),
            Err(CaptureError::InvalidUrl(_))
        ));
    }

    #[test]
    fn by_ordinal_is_one_based() {
        let system = CaptureSystem::new(&three_device_api(), true).unwrap();
        let registry = system.registry();
        assert!(registry.by_ordinal(0).is_none());
        assert_eq!(registry.by_ordinal(1).unwrap().name(), "Input A");
        assert!(registry.by_ordinal(4).is_none());
    }

    #[test]
    fn ordinals_skip_index_gaps() {
        let system = CaptureSystem::new(&three_device_api(), true).unwrap();
        let registry = system.registry();

        assert!(registry.get(2).is_none());
        assert_eq!(registry.by_ordinal(3).unwrap().name(), "Input C");
        assert_eq!(registry.resolve_url("sdi://device3").unwrap(), 2);
        assert_eq!(
            registry.device_for_url("sdi://device3").unwrap().name(),
            "Input C"
        );
    }

    #[test]
    fn duplicate_index_replaces_and_stops_previous() {
        let registry = registry();
        let first = MockDevice::new("First").with_hd_modes();
        registry.device_arrived(Arc::new(first.clone()), 0);
        registry
            .get(0)
            .unwrap()
            .start(DisplayModeId::HD1080P_25)
            .unwrap();
        assert!(first.is_streaming());

        registry.device_arrived(Arc::new(MockDevice::new("Second").with_hd_modes()), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).unwrap().name(), "Second");
        assert!(!first.is_streaming());
    }

    #[test]
    fn devices_without_input_are_skipped() {
        let registry = registry();
        registry.device_arrived(Arc::new(MockDevice::new("Output only").without_input()), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn hotplugged_devices_are_registered() {
        let api = MockCaptureApi::new();
        let system = CaptureSystem::new(&api, true).unwrap();
        assert!(system.registry().is_empty());

        api.discovery()
            .attach(MockDevice::new("Late").with_sub_device_index(3));
        assert_eq!(system.registry().len(), 1);
    }

    #[test]
    fn removal_keeps_controller_but_start_fails() {
        let api = three_device_api();
        let system = CaptureSystem::new(&api, true).unwrap();

        api.discovery().detach(0);
        assert_eq!(system.registry().len(), 3);

        let removed = system.registry().get(4).unwrap();
        assert!(matches!(
            removed.start(DisplayModeId::HD1080P_25),
            Err(CaptureError::DeviceRemoved(_))
        ));
    }

    #[test]
    fn disabled_discovery_yields_empty_registry() {
        let api = three_device_api()
            .with_error("create_discovery", CaptureError::Discovery("none".into()));
        let system = CaptureSystem::new(&api, true).unwrap();
        assert!(!system.is_discovery_enabled());
        assert!(system.registry().is_empty());
    }

    #[test]
    fn shutdown_uninstalls_then_stops_devices() {
        let device = MockDevice::new("Only").with_hd_modes();
        let api = MockCaptureApi::new().with_device(device.clone());
        let mut system = CaptureSystem::new(&api, true).unwrap();
        system
            .registry()
            .get(0)
            .unwrap()
            .start(DisplayModeId::HD720P_50)
            .unwrap();

        system.shutdown();
        assert!(!api.discovery().is_installed());
        assert!(system.registry().is_empty());
        assert!(!device.is_streaming());

        api.discovery().attach(MockDevice::new("After"));
        assert!(system.registry().is_empty());
    }
}
