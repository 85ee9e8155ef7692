//! End-to-end sessions against a running agent over loopback TCP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;
use woop_core::protocol::messages::{
    DeviceErrorCode, Frame, HelloAckMessage, HelloMessage, MessageType, RejectReason,
    MAX_PAYLOAD_LEN, PROTOCOL_VERSION,
};
use woop_core::{decode_message, encode_message, DeviceMessage, PinName, ProtocolError};
use woop_device::domain::{AgentIdentity, BoardLayout};
use woop_device::infrastructure::pin_driver::{DriverCall, MockPinDriver};
use woop_device::infrastructure::DeviceAgent;

struct Client {
    stream: TcpStream,
    buf: Vec<u8>,
    seq: u64,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            buf: Vec::new(),
            seq: 0,
        }
    }

    async fn request(&mut self, message: DeviceMessage) -> Frame {
        self.seq += 1;
        let bytes = encode_message(&message, self.seq).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
        self.read_frame().await.expect("connection closed before reply")
    }

    async fn read_frame(&mut self) -> Option<Frame> {
        let mut chunk = [0u8; 512];
        loop {
            match decode_message(&self.buf) {
                Ok((frame, used)) => {
                    self.buf.drain(..used);
                    return Some(frame);
                }
                Err(ProtocolError::InsufficientData { .. }) => {}
                Err(e) => panic!("decode error: {e}"),
            }
            let n = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut chunk))
                .await
                .unwrap()
                .unwrap();
            if n == 0 {
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn hello(&mut self, key: &str) -> Frame {
        self.request(DeviceMessage::Hello(HelloMessage {
            endpoint: "woopwoop1-main.test".to_string(),
            api_key_id: "id".to_string(),
            api_key: key.to_string(),
            session_flags: 0b111,
        }))
        .await
    }
}

async fn start_agent(driver: Arc<MockPinDriver>) -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let agent = Arc::new(DeviceAgent::new(
        AgentIdentity {
            endpoint: "woopwoop1-main.test".to_string(),
            api_key_id: "id".to_string(),
            api_key: "key".to_string(),
        },
        BoardLayout::default(),
        driver,
    ));
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(agent.serve(listener, Arc::clone(&running)));
    (addr, running)
}

#[tokio::test]
async fn test_full_session_writes_pins_and_answers_with_request_sequence() {
    // Arrange
    let driver = Arc::new(MockPinDriver::new());
    let (addr, running) = start_agent(Arc::clone(&driver)).await;
    let mut client = Client::connect(addr).await;

    // Act
    let ack = client.hello("key").await;
    let board = client
        .request(DeviceMessage::ResolveBoard { name: "board".to_string() })
        .await;
    let pin = client
        .request(DeviceMessage::ResolvePin { board: 1, name: "12".to_string() })
        .await;
    let DeviceMessage::PinResolved { handle } = pin.message else {
        panic!("expected PinResolved, got {:?}", pin.message);
    };
    let write = client.request(DeviceMessage::SetGpio { pin: handle, high: true }).await;
    let bytes = assert_ok!(encode_message(&DeviceMessage::Close, 99));
    assert_ok!(client.stream.write_all(&bytes).await);

    // Assert
    assert_eq!(
        ack.message,
        DeviceMessage::HelloAck(HelloAckMessage {
            accepted: true,
            reject_reason: RejectReason::None
        })
    );
    assert_eq!(ack.sequence_number, 1);
    assert_eq!(board.message, DeviceMessage::BoardResolved { handle: 1 });
    assert_eq!(write.message, DeviceMessage::Ack);
    assert_eq!(write.sequence_number, 4);
    assert!(client.read_frame().await.is_none(), "agent closes after CLOSE");
    assert_eq!(
        driver.calls(),
        [DriverCall::Digital(PinName::from_static("12"), true)]
    );

    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_bad_credentials_are_refused_and_connection_closed() {
    let (addr, running) = start_agent(Arc::new(MockPinDriver::new())).await;
    let mut client = Client::connect(addr).await;

    let ack = client.hello("wrong").await;

    assert_eq!(
        ack.message,
        DeviceMessage::HelloAck(HelloAckMessage {
            accepted: false,
            reject_reason: RejectReason::BadCredentials
        })
    );
    assert!(client.read_frame().await.is_none());
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_unsupported_version_is_refused() {
    // Arrange
    let (addr, running) = start_agent(Arc::new(MockPinDriver::new())).await;
    let mut client = Client::connect(addr).await;
    let mut bytes = encode_message(&DeviceMessage::Close, 7).unwrap();
    bytes[0] = 0x7F;

    // Act
    client.stream.write_all(&bytes).await.unwrap();
    let reply = client.read_frame().await.unwrap();

    // Assert
    assert_eq!(reply.sequence_number, 7);
    assert_eq!(
        reply.message,
        DeviceMessage::HelloAck(HelloAckMessage {
            accepted: false,
            reject_reason: RejectReason::UnsupportedVersion
        })
    );
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_driver_fault_is_reported_as_hardware_fault() {
    let (addr, running) = start_agent(Arc::new(MockPinDriver::failing_on(["14"]))).await;
    let mut client = Client::connect(addr).await;
    client.hello("key").await;
    let pin = client
        .request(DeviceMessage::ResolvePin { board: 1, name: "14".to_string() })
        .await;
    let DeviceMessage::PinResolved { handle } = pin.message else {
        panic!("expected PinResolved");
    };

    let reply = client.request(DeviceMessage::SetGpio { pin: handle, high: true }).await;

    assert!(matches!(
        reply.message,
        DeviceMessage::Error(ref e) if e.code == DeviceErrorCode::HardwareFault
    ));
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_oversized_frame_header_closes_unauthenticated_session() {
    // Arrange
    let driver = Arc::new(MockPinDriver::new());
    let (addr, running) = start_agent(Arc::clone(&driver)).await;
    let mut client = Client::connect(addr).await;
    let mut header = vec![PROTOCOL_VERSION, MessageType::Hello as u8, 0, 0];
    header.extend_from_slice(&u32::MAX.to_be_bytes());
    header.extend_from_slice(&1u64.to_be_bytes());

    // Act: announce a 4 GiB HELLO, then start streaming its body
    assert_ok!(client.stream.write_all(&header).await);
    let filler = vec![0u8; MAX_PAYLOAD_LEN];
    let _ = client.stream.write_all(&filler).await;

    // Assert: EOF or a reset, never a reply
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(5), client.stream.read(&mut buf))
        .await
        .expect("agent kept the connection open");
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected reply: {read:?}");
    assert!(driver.calls().is_empty());
    running.store(false, Ordering::Relaxed);
}
