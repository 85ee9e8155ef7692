//! Domain types shared by relay and device.
//!
//! Nothing in here performs I/O; the types describe *what* should happen to a
//! pin, and the protocol and agent layers decide *how*.

pub mod pin;
