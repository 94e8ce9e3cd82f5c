// Polling consumer that feeds converted capture frames to a video sink.

pub mod session;
pub mod sink;
