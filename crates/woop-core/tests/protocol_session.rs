//! Integration tests for the woop-core protocol codec.
//!
//! These tests drive the public API the way the relay and device agent do:
//! a full session's worth of requests is encoded into one byte stream, then
//! fed back to the decoder in awkward chunk sizes to mimic TCP reads.

use woop_core::{
    decode_message, encode_message,
    protocol::{
        messages::{session_flags, HelloAckMessage, HelloMessage, RejectReason},
        sequence::SequenceCounter,
        ProtocolError,
    },
    DeviceMessage,
};

fn session_requests() -> Vec<DeviceMessage> {
    vec![
        DeviceMessage::Hello(HelloMessage {
            endpoint: "woopwoop3-main.xyz.viam.cloud".to_string(),
            api_key_id: "key-id".to_string(),
            api_key: "key".to_string(),
            session_flags: session_flags::SINGLE_USE,
        }),
        DeviceMessage::ResolveBoard { name: "board".to_string() },
        DeviceMessage::ResolvePin { board: 1, name: "12".to_string() },
        DeviceMessage::ResolvePin { board: 1, name: "14".to_string() },
        DeviceMessage::SetGpio { pin: 100, high: false },
        DeviceMessage::SetGpio { pin: 101, high: true },
        DeviceMessage::Close,
    ]
}

/// Decodes every complete frame from `buf`, leaving any partial tail.
fn drain_frames(buf: &mut Vec<u8>, out: &mut Vec<(u64, DeviceMessage)>) {
    loop {
        match decode_message(buf) {
            Ok((frame, consumed)) => {
                buf.drain(..consumed);
                out.push((frame.sequence_number, frame.message));
            }
            Err(ProtocolError::InsufficientData { .. }) => return,
            Err(e) => panic!("unexpected decode error: {e}"),
        }
    }
}

#[test]
fn test_session_stream_decodes_across_chunk_boundaries() {
    // Arrange: encode the whole session into one stream
    let mut counter = SequenceCounter::new();
    let requests = session_requests();
    let mut stream = Vec::new();
    for msg in &requests {
        stream.extend_from_slice(&encode_message(msg, counter.next()).expect("encode"));
    }

    // Act: feed the decoder 7 bytes at a time
    let mut buf = Vec::new();
    let mut decoded = Vec::new();
    for chunk in stream.chunks(7) {
        buf.extend_from_slice(chunk);
        drain_frames(&mut buf, &mut decoded);
    }

    // Assert
    assert!(buf.is_empty(), "no bytes may be left over");
    assert_eq!(decoded.len(), requests.len());
    for (i, ((seq, msg), original)) in decoded.iter().zip(&requests).enumerate() {
        assert_eq!(*seq, i as u64 + 1, "sequence numbers must be preserved in order");
        assert_eq!(msg, original);
    }
}

#[test]
fn test_rejected_hello_ack_carries_reason() {
    let ack = DeviceMessage::HelloAck(HelloAckMessage {
        accepted: false,
        reject_reason: RejectReason::UnknownEndpoint,
    });
    let bytes = encode_message(&ack, 0).expect("encode");

    let (frame, _) = decode_message(&bytes).expect("decode");

    assert_eq!(frame.message, ack);
}
