//! Error types for the relay.
//!
//! [`DeviceError`] describes what went wrong on the device side of a session;
//! [`RelayError`] describes why a webhook request failed and knows which HTTP
//! status each failure maps to for each request [`Variant`].

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use woop_core::protocol::messages::{DeviceErrorCode, RejectReason};
use woop_core::ProtocolError;

use crate::domain::request::Variant;

/// A failure reported by, or while talking to, a device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The socket could not be opened, or an established one failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device refused the handshake.
    #[error("device rejected the session: {0}")]
    Rejected(RejectReason),

    /// Bytes on the wire could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device answered a request with an ERROR message.
    #[error("device reported {code:?}: {description}")]
    Remote {
        code: DeviceErrorCode,
        description: String,
    },

    /// The device answered with a message that does not fit the request.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// No answer arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The device closed the connection.
    #[error("connection closed by device")]
    Closed,
}

/// Why a webhook request failed.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or wrong `secret` query parameter.
    #[error("wrong or missing secret")]
    Unauthorized,

    /// The request body is not well-formed JSON.
    #[error("malformed JSON body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request is well-formed but a field is missing or has the wrong type.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Every connection attempt failed.
    #[error("could not connect to {endpoint} after {attempts} attempt(s): {source}")]
    Connection {
        endpoint: String,
        attempts: u32,
        #[source]
        source: DeviceError,
    },

    /// The board or one of its pins does not exist on the device.
    #[error("component {name:?} not found: {source}")]
    ComponentNotFound {
        name: String,
        #[source]
        source: DeviceError,
    },

    /// A pin write failed.
    #[error("{command} failed: {source}")]
    Write {
        command: String,
        #[source]
        source: DeviceError,
    },
}

impl RelayError {
    /// HTTP status reported for this failure on `variant`.
    ///
    /// Write failures differ by variant: the digital-only query variant
    /// answers 408, the colour variant 400.
    pub fn status_for(&self, variant: Variant) -> StatusCode {
        match self {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Decode(_) | RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::Connection { .. } => StatusCode::NOT_FOUND,
            RelayError::ComponentNotFound { .. } => StatusCode::EXPECTATION_FAILED,
            RelayError::Write { .. } => match variant {
                Variant::Color => StatusCode::BAD_REQUEST,
                Variant::Alert | Variant::Basic => StatusCode::REQUEST_TIMEOUT,
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
