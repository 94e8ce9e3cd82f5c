// Persisted capture configuration.

pub mod store;
pub mod types;
