//! Infrastructure layer for woop-relay.
//!
//! Owns all I/O: the HTTP listener callers post to, and the TCP sessions to
//! woop devices.
//!
//! # What does NOT belong here?
//!
//! - Request parsing and status mapping (domain layer)
//! - Retry policy and write ordering (application layer)
//! - Configuration parsing (`main.rs`)

pub mod device_conn;
pub mod http_server;

pub use device_conn::TcpDialer;
pub use http_server::{router, run_server};
