//! woop-device library crate.
//!
//! The device side of a woop: accepts short relay sessions over TCP, checks
//! the endpoint name and API key in the HELLO, and applies pin writes to one
//! named board through a [`application::session::PinDriver`].
//!
//! 1. The relay connects and sends HELLO; a mismatch is answered with a
//!    rejecting HELLO_ACK and the connection closes.
//! 2. The relay resolves the board, then each pin, to numeric handles.
//! 3. GPIO and PWM writes are forwarded to the driver and acknowledged.
//! 4. CLOSE (or EOF) ends the session.

/// Domain layer: board layout and agent configuration.
pub mod domain;

/// Application layer: per-connection session state machine.
pub mod application;

/// Infrastructure layer: TCP listener and pin drivers.
pub mod infrastructure;
