// Capture domain: discovery, per-device capture, and frame hand-off.

pub mod device;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod mailbox;
pub mod modes;
pub mod registry;
pub mod sdk;
pub mod url;
