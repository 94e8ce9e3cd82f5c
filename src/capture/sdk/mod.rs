//! Capture-card driver boundary.
//!
//! Everything the controller needs from the hardware is expressed as
//! traits in [`api`]. A real driver binding implements them; [`mock`]
//! provides an in-process simulation for tests and hardware-free hosts.

pub mod api;
pub mod mock;
pub mod types;
