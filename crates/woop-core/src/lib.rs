//! # woop-core
//!
//! Shared library for the woop relay containing the device protocol codec and
//! the pin command types that both ends of a device session agree on.
//!
//! This crate is used by the relay (`woop-relay`) and by the device agent
//! (`woop-device`).  It has no dependencies on sockets, async runtimes, or
//! HTTP frameworks.
//!
//! # Architecture overview
//!
//! A woop is a small controller board with a strobe light, a buzzer, and an
//! RGB lamp wired to GPIO pins.  The relay receives webhooks, opens a short
//! authenticated session to the woop's device agent, and asks it to drive
//! pins.
//!
//! - **`protocol`** – How bytes travel between relay and device.  Messages are
//!   encoded into a compact binary format (16-byte header + payload) and
//!   decoded back into typed Rust values on the other end.
//!
//! - **`domain`** – Pin names and pin writes (`Digital` or `Pwm`) with their
//!   validation rules.

pub mod domain;
pub mod protocol;

pub use domain::pin::{PinCommand, PinError, PinName, PinWrite};
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::DeviceMessage;
