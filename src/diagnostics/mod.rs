// Capture diagnostics.

pub mod stats;
