//! woop-relay library crate.
//!
//! An HTTP webhook that turns monitoring alerts and simple query-string or
//! JSON commands into GPIO writes on a remote woop.  Every request opens one
//! short, authenticated device session, drives its pins, and closes it.
//!
//! # Architecture
//!
//! ```text
//! Webhook caller (alerting system, curl, automation)
//!         ↕  HTTP
//! [woop-relay]
//!   ├── domain/           Config, endpoint names, request parsing, errors, wiring
//!   ├── application/      Connector (retry + backoff) and Dispatcher (variants)
//!   └── infrastructure/
//!         ├── http_server/  axum route and graceful shutdown
//!         └── device_conn/  TCP device session (woop-core codec)
//!         ↕  woop device protocol over TCP
//! woop-device agent on the controller board
//! ```
//!
//! # Layer rules
//!
//! - `domain` depends on `woop-core`, `serde_json` values, and the HTTP
//!   status type only; it performs no I/O.
//! - `application` talks to devices exclusively through the
//!   [`application::connector::DeviceDialer`] and
//!   [`application::connector::DeviceSession`] traits.
//! - `infrastructure` owns sockets, the HTTP listener, and the tokio runtime
//!   glue.

/// Domain layer: configuration, request types, wiring, and errors.
pub mod domain;

/// Application layer: connection retry and request dispatch.
pub mod application;

/// Infrastructure layer: HTTP server and TCP device sessions.
pub mod infrastructure;
