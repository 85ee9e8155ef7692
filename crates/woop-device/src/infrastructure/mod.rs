//! Infrastructure layer for woop-device.
//!
//! - `network`: TCP listener and per-connection tasks
//! - `pin_driver`: [`crate::application::PinDriver`] implementations

pub mod network;
pub mod pin_driver;

pub use network::{run_agent, DeviceAgent};
