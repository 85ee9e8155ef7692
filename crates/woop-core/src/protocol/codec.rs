//! Binary codec for encoding and decoding device protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][seq:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are big-endian.
//! Strings are a 2-byte length prefix followed by UTF-8 bytes.  A PWM duty
//! cycle travels as the big-endian bit pattern of an `f64`.

use crate::protocol::messages::{
    DeviceErrorCode, DeviceMessage, ErrorMessage, Frame, HelloAckMessage, HelloMessage,
    MessageType, RejectReason, HEADER_SIZE, MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than one complete frame.  Stream readers
    /// treat this as "read more bytes", not as a failure.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed or produced.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`DeviceMessage`] into a byte vector including the 16-byte header.
///
/// The sequence number is **not** chosen by this function: requests take a
/// fresh value from their session's [`crate::protocol::SequenceCounter`], replies echo the
/// sequence number of the request they answer.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if a string field is longer
/// than the 2-byte length prefix can express.
///
/// # Examples
///
/// ```rust
/// use woop_core::protocol::{decode_message, encode_message, DeviceMessage};
///
/// let msg = DeviceMessage::SetGpio { pin: 7, high: true };
/// let bytes = encode_message(&msg, 42).unwrap();
/// let (frame, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(frame.message, msg);
/// assert_eq!(frame.sequence_number, 42);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &DeviceMessage, sequence_number: u64) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    check_payload_len(payload.len())?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("payload of {} bytes is too large", payload.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + msg_type (1) + reserved (2) + payload_len (4) + seq (8)
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&sequence_number.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header +
/// payload), so the caller can drain its receive buffer.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] while the buffer holds less
/// than one complete frame, and the other variants when the bytes are
/// malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let msg_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let sequence_number = read_u64(bytes, 8)?;
    check_payload_len(payload_len)?;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let message = decode_payload(msg_type, payload)?;
    Ok((
        Frame {
            sequence_number,
            message,
        },
        total_needed,
    ))
}

fn check_payload_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::MalformedPayload(format!(
            "payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN}-byte limit"
        )));
    }
    Ok(())
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &DeviceMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        DeviceMessage::Hello(m) => encode_hello(&mut buf, m)?,
        DeviceMessage::HelloAck(m) => {
            buf.push(u8::from(m.accepted));
            buf.push(m.reject_reason as u8);
        }
        DeviceMessage::ResolveBoard { name } => write_length_prefixed_string(&mut buf, name)?,
        DeviceMessage::BoardResolved { handle } => buf.extend_from_slice(&handle.to_be_bytes()),
        DeviceMessage::ResolvePin { board, name } => {
            buf.extend_from_slice(&board.to_be_bytes());
            write_length_prefixed_string(&mut buf, name)?;
        }
        DeviceMessage::PinResolved { handle } => buf.extend_from_slice(&handle.to_be_bytes()),
        DeviceMessage::SetGpio { pin, high } => {
            buf.extend_from_slice(&pin.to_be_bytes());
            buf.push(u8::from(*high));
        }
        DeviceMessage::SetPwmFrequency { pin, frequency_hz } => {
            buf.extend_from_slice(&pin.to_be_bytes());
            buf.extend_from_slice(&frequency_hz.to_be_bytes());
        }
        DeviceMessage::SetPwmDuty { pin, duty } => {
            buf.extend_from_slice(&pin.to_be_bytes());
            buf.extend_from_slice(&duty.to_bits().to_be_bytes());
        }
        DeviceMessage::Ack | DeviceMessage::Close => {} // empty payload
        DeviceMessage::Error(m) => {
            buf.push(m.code as u8);
            write_length_prefixed_string(&mut buf, &m.description)?;
        }
    }
    Ok(buf)
}

fn encode_hello(buf: &mut Vec<u8>, m: &HelloMessage) -> Result<(), ProtocolError> {
    write_length_prefixed_string(buf, &m.endpoint)?;
    write_length_prefixed_string(buf, &m.api_key_id)?;
    write_length_prefixed_string(buf, &m.api_key)?;
    buf.extend_from_slice(&m.session_flags.to_be_bytes());
    Ok(())
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, p: &[u8]) -> Result<DeviceMessage, ProtocolError> {
    match msg_type {
        MessageType::Hello => decode_hello(p).map(DeviceMessage::Hello),
        MessageType::HelloAck => {
            require_len(p, 2, "HelloAck")?;
            let reject_reason = RejectReason::try_from(p[1]).map_err(|_| {
                ProtocolError::MalformedPayload(format!("unknown reject reason: {}", p[1]))
            })?;
            Ok(DeviceMessage::HelloAck(HelloAckMessage {
                accepted: p[0] != 0,
                reject_reason,
            }))
        }
        MessageType::ResolveBoard => {
            let (name, _) = read_length_prefixed_string(p, 0)?;
            Ok(DeviceMessage::ResolveBoard { name })
        }
        MessageType::BoardResolved => Ok(DeviceMessage::BoardResolved {
            handle: read_u32(p, 0, "BoardResolved")?,
        }),
        MessageType::ResolvePin => {
            let board = read_u32(p, 0, "ResolvePin")?;
            let (name, _) = read_length_prefixed_string(p, 4)?;
            Ok(DeviceMessage::ResolvePin { board, name })
        }
        MessageType::PinResolved => Ok(DeviceMessage::PinResolved {
            handle: read_u32(p, 0, "PinResolved")?,
        }),
        MessageType::SetGpio => {
            // 4 (pin) + 1 (level)
            require_len(p, 5, "SetGpio")?;
            Ok(DeviceMessage::SetGpio {
                pin: read_u32(p, 0, "SetGpio")?,
                high: p[4] != 0,
            })
        }
        MessageType::SetPwmFrequency => Ok(DeviceMessage::SetPwmFrequency {
            pin: read_u32(p, 0, "SetPwmFrequency")?,
            frequency_hz: read_u32(p, 4, "SetPwmFrequency")?,
        }),
        MessageType::SetPwmDuty => {
            // 4 (pin) + 8 (f64 bits)
            require_len(p, 12, "SetPwmDuty")?;
            Ok(DeviceMessage::SetPwmDuty {
                pin: read_u32(p, 0, "SetPwmDuty")?,
                duty: f64::from_bits(read_u64(p, 4)?),
            })
        }
        MessageType::Ack => Ok(DeviceMessage::Ack),
        MessageType::Error => {
            require_len(p, 3, "Error")?;
            let code = DeviceErrorCode::from(p[0]);
            let (description, _) = read_length_prefixed_string(p, 1)?;
            Ok(DeviceMessage::Error(ErrorMessage { code, description }))
        }
        MessageType::Close => Ok(DeviceMessage::Close),
    }
}

fn decode_hello(p: &[u8]) -> Result<HelloMessage, ProtocolError> {
    // 3 × 2 (string lengths) + 4 (flags)
    require_len(p, 10, "Hello")?;
    let (endpoint, off) = read_length_prefixed_string(p, 0)?;
    let (api_key_id, off) = read_length_prefixed_string(p, off)?;
    let (api_key, off) = read_length_prefixed_string(p, off)?;
    let session_flags = read_u32(p, off, "Hello.session_flags")?;
    Ok(HelloMessage {
        endpoint,
        api_key_id,
        api_key,
        session_flags,
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u32(buf: &[u8], offset: usize, context: &str) -> Result<u32, ProtocolError> {
    require_len(buf, offset + 4, context)?;
    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    if buf.len() < offset + 8 {
        return Err(ProtocolError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[offset..offset + 8]);
    Ok(u64::from_be_bytes(raw))
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_length_prefixed_string(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("string of {} bytes exceeds u16 prefix", s.len()))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after the string.
fn read_length_prefixed_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if buf.len() < offset + 2 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 2 bytes for string length at offset {offset}"
        )));
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
