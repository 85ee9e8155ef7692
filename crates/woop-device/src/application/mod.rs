//! Application layer for woop-device.

pub mod session;

pub use session::{DeviceSessionHandler, DriverError, PinDriver, Step};
