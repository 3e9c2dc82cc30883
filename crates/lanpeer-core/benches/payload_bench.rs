//! Criterion benchmarks for the lanpeer wire formats.
//!
//! Covers the discovery payloads, datagram framing, and the admission check,
//! which all sit on the per-datagram hot path of a tick.
//!
//! Run with:
//! ```bash
//! cargo bench --package lanpeer-core --bench payload_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lanpeer_core::protocol::{
    decode_discovery_reply, decode_packet, encode_discovery_probe, encode_discovery_reply,
    encode_packet, encode_string, is_discovery_probe, Packet,
};
use lanpeer_core::transport::RequestId;
use lanpeer_core::{AdmissionKey, AdmissionPolicy, ConnectionRequest, DeliveryMethod, PayloadReader};

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Discovery probe and reply encode/decode.
fn bench_discovery(c: &mut Criterion) {
    let probe = encode_discovery_probe();
    let reply = encode_discovery_reply();

    c.bench_function("discovery/encode_probe", |b| b.iter(encode_discovery_probe));
    c.bench_function("discovery/is_probe", |b| b.iter(|| is_discovery_probe(black_box(&probe))));
    c.bench_function("discovery/encode_reply", |b| b.iter(encode_discovery_reply));
    c.bench_function("discovery/decode_reply", |b| {
        b.iter(|| decode_discovery_reply(black_box(&reply)))
    });
}

/// Datagram framing for data packets of increasing size.
fn bench_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet");
    for size in [16usize, 256, 1200] {
        let payload = vec![0xA5u8; size];
        let packet = Packet::Data {
            channel: 0,
            delivery: DeliveryMethod::ReliableOrdered,
            payload: &payload,
        };
        let encoded = encode_packet(&packet);

        group.bench_with_input(BenchmarkId::new("encode_data", size), &packet, |b, p| {
            b.iter(|| encode_packet(black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("decode_data", size), &encoded, |b, bytes| {
            b.iter(|| decode_packet(black_box(bytes)))
        });
    }
    group.finish();
}

/// Reading a length-prefixed string through the payload cursor.
fn bench_reader(c: &mut Criterion) {
    let payload = encode_string("hello from a lanpeer client").unwrap_or_default();
    c.bench_function("reader/read_string", |b| {
        b.iter(|| {
            let mut reader = PayloadReader::new(black_box(&payload));
            reader.read_string().map(str::len)
        })
    });
}

/// Admission decisions for matching and non-matching keys.
fn bench_admission(c: &mut Criterion) {
    let policy = AdmissionPolicy::new(AdmissionKey::new("TestKey"));
    let addr = "192.168.1.40:50123".parse().unwrap();
    let good = ConnectionRequest::new(RequestId(0), addr, b"TestKey".to_vec());
    let bad = ConnectionRequest::new(RequestId(1), addr, b"WrongKey".to_vec());

    c.bench_function("admission/accept", |b| b.iter(|| policy.evaluate(black_box(&good))));
    c.bench_function("admission/reject", |b| b.iter(|| policy.evaluate(black_box(&bad))));
}

criterion_group!(benches, bench_discovery, bench_packet, bench_reader, bench_admission);
criterion_main!(benches);
