//! Device discovery.
//!
//! Owns the driver's enumeration session and the shared frame converter,
//! and forwards device arrivals to a single registrar callback. Arrival
//! callbacks run on the driver's notification thread.

use std::sync::Arc;

use super::device::device_name;
use super::error::Result;
use super::sdk::api::{
    CaptureApi, Device, DeviceNotificationCallback, DiscoverySession, FrameConverter,
};

/// Receives `(device, sub_device_index)` for every arriving device.
pub type ArrivalCallback = Box<dyn Fn(Arc<dyn Device>, usize) + Send + Sync>;

/// Sub-device index used when the attribute cannot be read.
pub const DEFAULT_SUB_DEVICE_INDEX: usize = 0;

/// Resolve the sub-device index of `device`, falling back to
/// [`DEFAULT_SUB_DEVICE_INDEX`].
pub fn sub_device_index(device: &dyn Device) -> usize {
    match device.sub_device_index() {
        Ok(index) => usize::try_from(index).unwrap_or_else(|_| {
            tracing::error!("Invalid sub-device index {index}, using {DEFAULT_SUB_DEVICE_INDEX}");
            DEFAULT_SUB_DEVICE_INDEX
        }),
        Err(e) => {
            tracing::error!(
                "Sub-device index unavailable, using {DEFAULT_SUB_DEVICE_INDEX}: {e}"
            );
            DEFAULT_SUB_DEVICE_INDEX
        }
    }
}

/// Notification sink installed on the enumeration session.
struct DeviceNotifier {
    on_arrived: ArrivalCallback,
}

impl DeviceNotificationCallback for DeviceNotifier {
    fn device_arrived(&self, device: Arc<dyn Device>) {
        let index = sub_device_index(&*device);
        tracing::info!("Capture device arrived: {} (index {index})", device_name(&*device));
        (self.on_arrived)(device, index);
    }

    fn device_removed(&self, device: Arc<dyn Device>) {
        // Existing controllers are left in place; their driver calls fail
        // from now on.
        tracing::info!("Capture device removed: {}", device_name(&*device));
    }
}

/// Enumeration session plus shared converter.
pub struct DeviceDiscovery {
    session: Option<Arc<dyn DiscoverySession>>,
    converter: Option<Arc<dyn FrameConverter>>,
    installed: bool,
}

impl DeviceDiscovery {
    /// Create the enumeration session and converter.
    ///
    /// If the session cannot be created discovery is disabled entirely.
    /// A missing converter only disables frame decoding.
    pub fn new(api: &dyn CaptureApi) -> Self {
        let session = match api.create_discovery() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Capture device discovery unavailable: {e}");
                return Self {
                    session: None,
                    converter: None,
                    installed: false,
                };
            }
        };

        let converter = api
            .create_video_converter()
            .map_err(|e| {
                tracing::error!("Frame converter unavailable, frames will not decode: {e}")
            })
            .ok();

        Self {
            session: Some(session),
            converter,
            installed: false,
        }
    }

    /// Create discovery and immediately start reporting arrivals.
    pub fn initialize(api: &dyn CaptureApi, on_arrived: ArrivalCallback) -> Result<Self> {
        let mut discovery = Self::new(api);
        discovery.install(on_arrived)?;
        Ok(discovery)
    }

    /// Install the arrival callback on the enumeration session.
    ///
    /// Devices already present are reported during this call. Does nothing
    /// when discovery is disabled.
    pub fn install(&mut self, on_arrived: ArrivalCallback) -> Result<()> {
        let Some(session) = &self.session else {
            tracing::debug!("Discovery disabled, arrival callback not installed");
            return Ok(());
        };
        if self.installed {
            session.uninstall_device_notifications()?;
            self.installed = false;
        }
        session.install_device_notifications(Arc::new(DeviceNotifier { on_arrived }))?;
        self.installed = true;
        Ok(())
    }

    /// Shared converter for controllers, if one could be created.
    pub fn converter(&self) -> Option<Arc<dyn FrameConverter>> {
        self.converter.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Uninstall notifications. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if !self.installed {
            return;
        }
        self.installed = false;
        if let Some(session) = &self.session {
            if let Err(e) = session.uninstall_device_notifications() {
                tracing::error!("Uninstalling device notifications failed: {e}");
            }
        }
    }
}

impl Drop for DeviceDiscovery {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::error::CaptureError;
    use crate::capture::sdk::mock::{MockCaptureApi, MockDevice};
    use parking_lot::Mutex;

    fn recorder() -> (ArrivalCallback, Arc<Mutex<Vec<(String, usize)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ArrivalCallback = Box::new(move |device, index| {
            sink.lock().push((device_name(&*device), index));
        });
        (callback, seen)
    }

    #[test]
    fn reports_present_devices_with_index() {
        let api = MockCaptureApi::new()
            .with_device(MockDevice::new("A").with_sub_device_index(2))
            .with_device(MockDevice::new("B").with_sub_device_index(0));
        let (callback, seen) = recorder();

        let discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        assert!(discovery.is_enabled());
        assert!(discovery.converter().is_some());
        assert_eq!(
            *seen.lock(),
            vec![("A".to_string(), 2), ("B".to_string(), 0)]
        );
    }

    #[test]
    fn missing_index_defaults_to_zero() {
        let api =
            MockCaptureApi::new().with_device(MockDevice::new("A").without_sub_device_index());
        let (callback, seen) = recorder();
        let _discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        assert_eq!(seen.lock()[0].1, DEFAULT_SUB_DEVICE_INDEX);
    }

    #[test]
    fn negative_index_defaults_to_zero() {
        let device = MockDevice::new("A").with_sub_device_index(-3);
        assert_eq!(sub_device_index(&device), DEFAULT_SUB_DEVICE_INDEX);
    }

    #[test]
    fn hotplugged_devices_are_reported() {
        let api = MockCaptureApi::new();
        let (callback, seen) = recorder();
        let _discovery = DeviceDiscovery::initialize(&api, callback).unwrap();

        api.discovery()
            .attach(MockDevice::new("Late").with_sub_device_index(1));
        assert_eq!(seen.lock().len(), 1);

        api.discovery().detach(0);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn session_failure_disables_discovery() {
        let api = MockCaptureApi::new()
            .with_device(MockDevice::new("A"))
            .with_error("create_discovery", CaptureError::Discovery("no driver".into()));
        let (callback, seen) = recorder();

        let discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        assert!(!discovery.is_enabled());
        assert!(!discovery.is_installed());
        assert!(discovery.converter().is_none());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn converter_failure_keeps_discovery() {
        let api = MockCaptureApi::new()
            .with_device(MockDevice::new("A"))
            .with_error("create_video_converter", CaptureError::Sdk("no converter".into()));
        let (callback, seen) = recorder();

        let discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        assert!(discovery.is_enabled());
        assert!(discovery.converter().is_none());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn install_failure_is_reported() {
        let api = MockCaptureApi::new();
        api.discovery().fail_next(
            "install_device_notifications",
            CaptureError::Discovery("refused".into()),
        );
        let (callback, _) = recorder();
        assert!(DeviceDiscovery::initialize(&api, callback).is_err());
    }

    #[test]
    fn shutdown_uninstalls_notifications() {
        let api = MockCaptureApi::new();
        let (callback, seen) = recorder();
        let mut discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        assert!(api.discovery().is_installed());

        discovery.shutdown();
        discovery.shutdown();
        assert!(!api.discovery().is_installed());

        api.discovery().attach(MockDevice::new("After"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn drop_uninstalls_notifications() {
        let api = MockCaptureApi::new();
        let (callback, _) = recorder();
        let discovery = DeviceDiscovery::initialize(&api, callback).unwrap();
        drop(discovery);
        assert!(!api.discovery().is_installed());
    }
}
