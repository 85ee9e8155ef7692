//! All device protocol message types.
//!
//! The relay is always the requester: it sends `Hello`, lookups, and writes;
//! the device agent answers each request with exactly one reply carrying the
//! request's sequence number.

use std::fmt;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common message header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload either side accepts.  Every message fits well inside;
/// a larger `payload_len` is treated as a malformed frame, not as a request
/// to keep reading.
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes understood by relay and device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Session (0x00–0x0F)
    Hello = 0x01,
    HelloAck = 0x02,
    // Component lookup (0x10–0x1F)
    ResolveBoard = 0x10,
    BoardResolved = 0x11,
    ResolvePin = 0x12,
    PinResolved = 0x13,
    // Pin writes (0x20–0x2F)
    SetGpio = 0x20,
    SetPwmFrequency = 0x21,
    SetPwmDuty = 0x22,
    Ack = 0x2F,
    // Failure and teardown (0x30–0x3F)
    Error = 0x30,
    Close = 0x3F,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Hello),
            0x02 => Ok(MessageType::HelloAck),
            0x10 => Ok(MessageType::ResolveBoard),
            0x11 => Ok(MessageType::BoardResolved),
            0x12 => Ok(MessageType::ResolvePin),
            0x13 => Ok(MessageType::PinResolved),
            0x20 => Ok(MessageType::SetGpio),
            0x21 => Ok(MessageType::SetPwmFrequency),
            0x22 => Ok(MessageType::SetPwmDuty),
            0x2F => Ok(MessageType::Ack),
            0x30 => Ok(MessageType::Error),
            0x3F => Ok(MessageType::Close),
            _ => Err(()),
        }
    }
}

// ── Session flags ─────────────────────────────────────────────────────────────

/// Session flag bits carried in [`HelloMessage::session_flags`].
///
/// Each bit switches off one background behaviour a long-lived client would
/// normally negotiate.  The relay opens one session per webhook call, so it
/// always sends [`session_flags::SINGLE_USE`].
pub mod session_flags {
    pub const NO_RECONNECT: u32 = 1 << 0;
    pub const NO_LIVENESS_CHECK: u32 = 1 << 1;
    pub const NO_CREDENTIAL_REFRESH: u32 = 1 << 2;

    pub const SINGLE_USE: u32 = NO_RECONNECT | NO_LIVENESS_CHECK | NO_CREDENTIAL_REFRESH;
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// HELLO (0x01): opens an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct HelloMessage {
    /// Endpoint name the relay believes it is talking to.
    pub endpoint: String,
    /// Identifier of the API key.
    pub api_key_id: String,
    /// The API key itself.
    pub api_key: String,
    /// Bitmask of [`session_flags`].
    pub session_flags: u32,
}

impl fmt::Debug for HelloMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelloMessage")
            .field("endpoint", &self.endpoint)
            .field("api_key_id", &self.api_key_id)
            .field("api_key", &"<redacted>")
            .field("session_flags", &self.session_flags)
            .finish()
    }
}

/// Why a device refused a HELLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RejectReason {
    None = 0x00,
    BadCredentials = 0x01,
    UnknownEndpoint = 0x02,
    UnsupportedVersion = 0x03,
}

impl TryFrom<u8> for RejectReason {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(RejectReason::None),
            0x01 => Ok(RejectReason::BadCredentials),
            0x02 => Ok(RejectReason::UnknownEndpoint),
            0x03 => Ok(RejectReason::UnsupportedVersion),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::None => "none",
            RejectReason::BadCredentials => "bad credentials",
            RejectReason::UnknownEndpoint => "unknown endpoint",
            RejectReason::UnsupportedVersion => "unsupported protocol version",
        };
        f.write_str(text)
    }
}

/// HELLO_ACK (0x02): device answer to a HELLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloAckMessage {
    pub accepted: bool,
    /// [`RejectReason::None`] when accepted.
    pub reject_reason: RejectReason,
}

/// Error codes carried in [`ErrorMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceErrorCode {
    NotFound = 0x01,
    InvalidArgument = 0x02,
    HardwareFault = 0x03,
    NotAuthenticated = 0x04,
    Internal = 0x05,
}

impl From<u8> for DeviceErrorCode {
    /// Unknown codes collapse to [`DeviceErrorCode::Internal`].
    fn from(value: u8) -> Self {
        match value {
            0x01 => DeviceErrorCode::NotFound,
            0x02 => DeviceErrorCode::InvalidArgument,
            0x03 => DeviceErrorCode::HardwareFault,
            0x04 => DeviceErrorCode::NotAuthenticated,
            _ => DeviceErrorCode::Internal,
        }
    }
}

/// ERROR (0x30): a request could not be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: DeviceErrorCode,
    pub description: String,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// A decoded device protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    Hello(HelloMessage),
    HelloAck(HelloAckMessage),
    ResolveBoard { name: String },
    BoardResolved { handle: u32 },
    ResolvePin { board: u32, name: String },
    PinResolved { handle: u32 },
    SetGpio { pin: u32, high: bool },
    SetPwmFrequency { pin: u32, frequency_hz: u32 },
    SetPwmDuty { pin: u32, duty: f64 },
    Ack,
    Error(ErrorMessage),
    Close,
}

impl DeviceMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            DeviceMessage::Hello(_) => MessageType::Hello,
            DeviceMessage::HelloAck(_) => MessageType::HelloAck,
            DeviceMessage::ResolveBoard { .. } => MessageType::ResolveBoard,
            DeviceMessage::BoardResolved { .. } => MessageType::BoardResolved,
            DeviceMessage::ResolvePin { .. } => MessageType::ResolvePin,
            DeviceMessage::PinResolved { .. } => MessageType::PinResolved,
            DeviceMessage::SetGpio { .. } => MessageType::SetGpio,
            DeviceMessage::SetPwmFrequency { .. } => MessageType::SetPwmFrequency,
            DeviceMessage::SetPwmDuty { .. } => MessageType::SetPwmDuty,
            DeviceMessage::Ack => MessageType::Ack,
            DeviceMessage::Error(_) => MessageType::Error,
            DeviceMessage::Close => MessageType::Close,
        }
    }
}

/// One message together with the sequence number from its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence_number: u64,
    pub message: DeviceMessage,
}
