//! Criterion benchmarks for the data-channel packet codec and control text codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package vstream-core --bench packet_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vstream_core::protocol::packet::{decode_packet, encode_packet_at, RtpHeader};
use vstream_core::protocol::rtsp::{Method, Reply, Request};

/// Typical MJPEG frame sizes at low, medium and high quality.
const PAYLOAD_SIZES: &[usize] = &[1_024, 16_384, 60_000];

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_packet");
    let header = RtpHeader::mjpeg(1, 0);
    for &size in PAYLOAD_SIZES {
        let payload = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::new("payload", size), &payload, |b, payload| {
            b.iter(|| {
                encode_packet_at(black_box(&header), black_box(payload), black_box(0))
                    .expect("encode must succeed")
            })
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet");
    let header = RtpHeader::mjpeg(1, 0);
    for &size in PAYLOAD_SIZES {
        let bytes = encode_packet_at(&header, &vec![0xABu8; size], 0)
            .expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("payload", size), &bytes, |b, bytes| {
            b.iter(|| decode_packet(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

fn bench_control_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_text");

    let request = Request::new(Method::Setup, "movie.mjpg", 1).with_client_port(25000);
    let request_text = request.to_string();
    group.bench_function("parse_setup_request", |b| {
        b.iter(|| black_box(&request_text).parse::<Request>().unwrap())
    });

    let reply_text = Reply::ok(12, Some(123456)).to_string();
    group.bench_function("parse_ok_reply", |b| {
        b.iter(|| black_box(&reply_text).parse::<Reply>().unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_control_text);
criterion_main!(benches);
