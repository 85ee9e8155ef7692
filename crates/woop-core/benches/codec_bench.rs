//! Criterion benchmarks for the device protocol codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package woop-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use woop_core::protocol::codec::{decode_message, encode_message};
use woop_core::protocol::messages::{session_flags, DeviceMessage, HelloMessage};

fn fixtures() -> Vec<(&'static str, DeviceMessage)> {
    vec![
        (
            "hello",
            DeviceMessage::Hello(HelloMessage {
                endpoint: "woopwoop7-main.xyz.viam.cloud".to_string(),
                api_key_id: "0123456789abcdef".to_string(),
                api_key: "fedcba9876543210fedcba9876543210".to_string(),
                session_flags: session_flags::SINGLE_USE,
            }),
        ),
        ("resolve_pin", DeviceMessage::ResolvePin { board: 1, name: "19".to_string() }),
        ("set_gpio", DeviceMessage::SetGpio { pin: 12, high: true }),
        ("set_pwm_duty", DeviceMessage::SetPwmDuty { pin: 19, duty: 0.5 }),
        ("ack", DeviceMessage::Ack),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for (name, msg) in fixtures() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &msg, |b, msg| {
            b.iter(|| encode_message(black_box(msg), 1).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for (name, msg) in fixtures() {
        let bytes = encode_message(&msg, 1).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &bytes, |b, bytes| {
            b.iter(|| decode_message(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
