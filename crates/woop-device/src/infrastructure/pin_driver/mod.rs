//! Pin driver implementations.
//!
//! `memory` keeps pin state in a map and logs every write; it is what the
//! agent binary runs with on hosts without GPIO access.  `mock` records
//! calls and can be told to fail, for tests here and in the relay.

pub mod memory;
pub mod mock;

pub use memory::{LoggingPinDriver, PinState};
pub use mock::{DriverCall, MockPinDriver};
