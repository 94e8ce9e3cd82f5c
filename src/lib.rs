//! SDI capture-card controller.
//!
//! Discovers capture devices through a driver abstraction, streams their
//! input, converts frames to 8-bit BGRA on the driver's delivery thread,
//! and hands the most recent frame to a polling consumer.
//!
//! The driver is reached through the traits in [`capture::sdk::api`];
//! [`capture::sdk::mock`] simulates one for tests and hardware-free hosts.

pub mod capture;
pub mod diagnostics;
pub mod player;
pub mod settings;

pub use capture::device::CaptureDevice;
pub use capture::error::{CaptureError, Result};
pub use capture::registry::{CaptureSystem, DeviceRegistry};
pub use player::session::CapturePlayer;
