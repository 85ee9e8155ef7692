//! Application layer: use cases that depend only on domain types and the
//! device traits declared in [`connector`].

pub mod connector;
pub mod dispatch;

pub use connector::{Connector, DeviceDialer, DeviceSession, RetryPolicy, SessionOptions};
pub use dispatch::{Dispatcher, WritePlan};
