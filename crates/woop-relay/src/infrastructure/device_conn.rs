//! TCP device sessions over the woop-core codec.
//!
//! [`TcpDialer`] opens a connection to `<endpoint>:<device_port>` (or to the
//! configured override address), sends HELLO, and waits for HELLO_ACK.
//! [`TcpDeviceSession`] then runs strict request/response exchanges: one
//! request out, one reply in, matched on the sequence number.
//!
//! TCP is a stream protocol, so replies are accumulated in a receive buffer
//! and decoded once `decode_message` stops reporting `InsufficientData`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use woop_core::protocol::messages::{Frame, HelloMessage};
use woop_core::protocol::{decode_message, encode_message, ProtocolError, SequenceCounter};
use woop_core::{DeviceMessage, PinName};

use crate::application::connector::{
    BoardHandle, DeviceDialer, DeviceSession, PinHandle, SessionOptions,
};
use crate::domain::{Credentials, DeviceError, EndpointId, RelayConfig};

const READ_CHUNK: usize = 1024;

/// Dials devices over TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    device_port: u16,
    addr_override: Option<SocketAddr>,
    rpc_timeout: Duration,
}

impl TcpDialer {
    pub fn new(device_port: u16, addr_override: Option<SocketAddr>, rpc_timeout: Duration) -> Self {
        Self {
            device_port,
            addr_override,
            rpc_timeout,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.device_port,
            config.device_addr_override,
            config.rpc_timeout,
        )
    }
}

#[async_trait]
impl DeviceDialer for TcpDialer {
    async fn dial(
        &self,
        endpoint: &EndpointId,
        credentials: &Credentials,
        options: &SessionOptions,
    ) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let stream = match self.addr_override {
            Some(addr) => TcpStream::connect(addr).await?,
            None => TcpStream::connect((endpoint.host(), self.device_port)).await?,
        };
        stream.set_nodelay(true)?;
        debug!(%endpoint, peer = ?stream.peer_addr().ok(), "TCP connected");

        let mut session = TcpDeviceSession::new(stream, self.rpc_timeout);
        let hello = DeviceMessage::Hello(HelloMessage {
            endpoint: endpoint.to_string(),
            api_key_id: credentials.api_key_id.clone(),
            api_key: credentials.api_key.clone(),
            session_flags: options.session_flags(),
        });
        match session.exchange(hello).await? {
            DeviceMessage::HelloAck(ack) if ack.accepted => Ok(Box::new(session)),
            DeviceMessage::HelloAck(ack) => Err(DeviceError::Rejected(ack.reject_reason)),
            other => Err(unexpected("HELLO_ACK", &other)),
        }
    }
}

/// An open session on a TCP stream.
pub struct TcpDeviceSession {
    stream: TcpStream,
    recv_buf: Vec<u8>,
    sequence: SequenceCounter,
    rpc_timeout: Duration,
    closed: bool,
}

impl TcpDeviceSession {
    fn new(stream: TcpStream, rpc_timeout: Duration) -> Self {
        Self {
            stream,
            recv_buf: Vec::with_capacity(READ_CHUNK),
            sequence: SequenceCounter::new(),
            rpc_timeout,
            closed: false,
        }
    }

    /// Sends `request` and returns its reply.  ERROR replies become
    /// [`DeviceError::Remote`].
    async fn exchange(&mut self, request: DeviceMessage) -> Result<DeviceMessage, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        let seq = self.sequence.next();
        let bytes = encode_message(&request, seq)?;
        trace!(seq, kind = ?request.message_type(), "sending");

        let timeout = self.rpc_timeout;
        let frame = tokio::time::timeout(timeout, self.round_trip(&bytes))
            .await
            .map_err(|_| DeviceError::Timeout(timeout))??;

        if frame.sequence_number != seq {
            return Err(DeviceError::UnexpectedReply(format!(
                "reply sequence {} does not answer request {seq}",
                frame.sequence_number
            )));
        }
        match frame.message {
            DeviceMessage::Error(e) => Err(DeviceError::Remote {
                code: e.code,
                description: e.description,
            }),
            reply => Ok(reply),
        }
    }

    async fn round_trip(&mut self, bytes: &[u8]) -> Result<Frame, DeviceError> {
        self.stream.write_all(bytes).await?;
        read_frame(&mut self.stream, &mut self.recv_buf).await
    }

    async fn expect_ack(&mut self, request: DeviceMessage) -> Result<(), DeviceError> {
        match self.exchange(request).await? {
            DeviceMessage::Ack => Ok(()),
            other => Err(unexpected("ACK", &other)),
        }
    }
}

#[async_trait]
impl DeviceSession for TcpDeviceSession {
    async fn board(&mut self, name: &str) -> Result<BoardHandle, DeviceError> {
        let request = DeviceMessage::ResolveBoard {
            name: name.to_string(),
        };
        match self.exchange(request).await? {
            DeviceMessage::BoardResolved { handle } => Ok(BoardHandle(handle)),
            other => Err(unexpected("BOARD_RESOLVED", &other)),
        }
    }

    async fn gpio_pin(&mut self, board: BoardHandle, name: &PinName) -> Result<PinHandle, DeviceError> {
        let request = DeviceMessage::ResolvePin {
            board: board.0,
            name: name.to_string(),
        };
        match self.exchange(request).await? {
            DeviceMessage::PinResolved { handle } => Ok(PinHandle(handle)),
            other => Err(unexpected("PIN_RESOLVED", &other)),
        }
    }

    async fn set_gpio(&mut self, pin: PinHandle, high: bool) -> Result<(), DeviceError> {
        self.expect_ack(DeviceMessage::SetGpio { pin: pin.0, high }).await
    }

    async fn set_pwm_frequency(&mut self, pin: PinHandle, frequency_hz: u32) -> Result<(), DeviceError> {
        self.expect_ack(DeviceMessage::SetPwmFrequency {
            pin: pin.0,
            frequency_hz,
        })
        .await
    }

    async fn set_pwm_duty(&mut self, pin: PinHandle, duty: f64) -> Result<(), DeviceError> {
        self.expect_ack(DeviceMessage::SetPwmDuty { pin: pin.0, duty }).await
    }

    /// Sends CLOSE without waiting for an answer and shuts the stream down.
    async fn close(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let bytes = encode_message(&DeviceMessage::Close, self.sequence.next())?;
        let sent = self.stream.write_all(&bytes).await;
        let shut = self.stream.shutdown().await;
        sent?;
        shut?;
        debug!(last_seq = ?self.sequence.last_issued(), "device session closed");
        Ok(())
    }
}

impl Drop for TcpDeviceSession {
    /// Release on cancellation: a request future dropped before `close`
    /// still tells the device, with a non-blocking CLOSE.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Ok(bytes) = encode_message(&DeviceMessage::Close, self.sequence.next()) {
            match self.stream.try_write(&bytes) {
                Ok(n) if n == bytes.len() => debug!("device session released on drop"),
                _ => debug!("device session dropped; device will see EOF"),
            }
        }
    }
}

/// Reads until one complete frame is buffered, then removes and returns it.
async fn read_frame(stream: &mut TcpStream, recv_buf: &mut Vec<u8>) -> Result<Frame, DeviceError> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match decode_message(recv_buf) {
            Ok((frame, consumed)) => {
                recv_buf.drain(..consumed);
                return Ok(frame);
            }
            Err(ProtocolError::InsufficientData { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(DeviceError::Closed);
        }
        recv_buf.extend_from_slice(&chunk[..n]);
    }
}

fn unexpected(wanted: &str, got: &DeviceMessage) -> DeviceError {
    DeviceError::UnexpectedReply(format!("expected {wanted}, got {:?}", got.message_type()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
