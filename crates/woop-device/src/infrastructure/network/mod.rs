//! TCP listener for relay sessions.
//!
//! [`DeviceAgent::serve`] runs an accept loop that checks the shared
//! `running` flag every 200 ms.  Each accepted connection gets its own task
//! that buffers incoming bytes, decodes complete frames, feeds them to a
//! [`DeviceSessionHandler`], and writes the reply tagged with the request's
//! sequence number.  A frame announcing more than
//! [`woop_core::protocol::MAX_PAYLOAD_LEN`] bytes ends the session, so the
//! receive buffer never grows past one frame plus one read.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use woop_core::protocol::messages::{RejectReason, HEADER_SIZE};
use woop_core::protocol::{decode_message, encode_message, ProtocolError};
use woop_core::DeviceMessage;

use crate::application::session::{reject, DeviceSessionHandler, PinDriver, Step};
use crate::domain::{AgentConfig, AgentIdentity, BoardLayout};

const ACCEPT_POLL: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 1024;
/// A relay that sends nothing for this long is disconnected.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state for all sessions of one agent.
pub struct DeviceAgent {
    identity: Arc<AgentIdentity>,
    layout: Arc<BoardLayout>,
    driver: Arc<dyn PinDriver>,
}

impl DeviceAgent {
    pub fn new(identity: AgentIdentity, layout: BoardLayout, driver: Arc<dyn PinDriver>) -> Self {
        Self {
            identity: Arc::new(identity),
            layout: Arc::new(layout),
            driver,
        }
    }

    /// Accepts sessions on `listener` until `running` is cleared.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            let (stream, peer) = match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok(accepted)) => accepted,
                Ok(Err(e)) => {
                    error!("accept error: {e}");
                    continue;
                }
                Err(_) => continue,
            };
            let agent = Arc::clone(&self);
            tokio::spawn(async move {
                agent.handle_connection(stream, peer).await;
            });
        }
        info!("device agent accept loop stopped");
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let session_id = Uuid::new_v4();
        debug!(%session_id, %peer, "relay connected");
        let mut handler = DeviceSessionHandler::new(
            Arc::clone(&self.identity),
            Arc::clone(&self.layout),
            Arc::clone(&self.driver),
        );
        let mut recv_buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        'session: loop {
            let n = match timeout(IDLE_TIMEOUT, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    debug!(%session_id, "relay disconnected (EOF)");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    warn!(%session_id, "read failed: {e}");
                    break;
                }
                Err(_) => {
                    warn!(%session_id, idle = ?IDLE_TIMEOUT, "relay idle, closing session");
                    break;
                }
            };
            recv_buf.extend_from_slice(&chunk[..n]);

            loop {
                let (frame, consumed) = match decode_message(&recv_buf) {
                    Ok(decoded) => decoded,
                    Err(ProtocolError::InsufficientData { .. }) => break,
                    Err(ProtocolError::UnsupportedVersion(v)) => {
                        warn!(%session_id, version = v, "unsupported protocol version");
                        let reply = reject(RejectReason::UnsupportedVersion);
                        let _ = send(&mut stream, &reply, header_sequence(&recv_buf)).await;
                        break 'session;
                    }
                    Err(e) => {
                        warn!(%session_id, "decode error: {e}");
                        break 'session;
                    }
                };
                recv_buf.drain(..consumed);

                let (reply, close) = match handler.handle(frame.message) {
                    Step::Reply(reply) => (Some(reply), false),
                    Step::ReplyAndClose(reply) => (Some(reply), true),
                    Step::Close => (None, true),
                };
                if let Some(reply) = reply {
                    if let Err(e) = send(&mut stream, &reply, frame.sequence_number).await {
                        warn!(%session_id, "write failed: {e:#}");
                        break 'session;
                    }
                }
                if close {
                    break 'session;
                }
            }
        }

        let _ = stream.shutdown().await;
        debug!(%session_id, "session ended");
    }
}

async fn send(stream: &mut TcpStream, message: &DeviceMessage, seq: u64) -> anyhow::Result<()> {
    let bytes = encode_message(message, seq).context("failed to encode reply")?;
    stream
        .write_all(&bytes)
        .await
        .context("failed to write reply")
}

/// Sequence number from a raw header, or 0 if the header is incomplete.
fn header_sequence(buf: &[u8]) -> u64 {
    buf.get(8..HEADER_SIZE)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

/// Binds `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_agent(
    config: AgentConfig,
    driver: Arc<dyn PinDriver>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind device listener on {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        endpoint = %config.identity.endpoint,
        board = %config.layout.name,
        pins = config.layout.pins.len(),
        "device agent listening"
    );
    let agent = Arc::new(DeviceAgent::new(config.identity, config.layout, driver));
    agent.serve(listener, running).await;
    Ok(())
}
