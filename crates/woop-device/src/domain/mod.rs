//! Domain layer for woop-device.

pub mod board;

pub use board::{AgentConfig, AgentIdentity, BoardLayout, ConfigError, BOARD_HANDLE};
