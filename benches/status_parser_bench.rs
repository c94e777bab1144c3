//! Performance benchmarks for the status reply parser.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench status_parser_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use doorlock_core::{DeviceId, LockCommand};
use doorlock_core::constants::PARAM_MANUAL;
use doorlock_protocol::{build_structured_frame, parse_status_response, status_from_reply};
use std::hint::black_box;

fn soh_reply_with_noise(noise: usize) -> Vec<u8> {
    let mut data = vec![0xAA; noise];
    data.extend_from_slice(&[0x01, b'0', b'1', 0x10, 0x03]);
    data
}

/// Benchmark parsing aligned and noisy SOH replies.
fn bench_parse_soh(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_soh");

    for noise in [0usize, 16, 59] {
        let data = soh_reply_with_noise(noise);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(noise), &data, |b, data| {
            b.iter(|| black_box(parse_status_response(black_box(data))));
        });
    }

    group.finish();
}

/// Benchmark the STX-marker fallback, which runs after a full SOH scan.
fn bench_parse_stx_marker(c: &mut Criterion) {
    let data = [0x02, b'S', 0x01, b'1', b'0', 0x10, 0x03];

    c.bench_function("parse_stx_marker", |b| {
        b.iter(|| black_box(parse_status_response(black_box(&data))));
    });
}

/// Benchmark a full-capacity reply that matches nothing.
fn bench_parse_unparsed(c: &mut Criterion) {
    let data = vec![0xAA; 64];

    c.bench_function("parse_unparsed_64", |b| {
        b.iter(|| black_box(status_from_reply(black_box(&data))));
    });
}

fn bench_build_structured(c: &mut Criterion) {
    let device_id = DeviceId::new(15).unwrap();

    c.bench_function("build_structured_frame", |b| {
        b.iter(|| {
            black_box(build_structured_frame(
                black_box(device_id),
                LockCommand::Open,
                PARAM_MANUAL,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_parse_soh,
    bench_parse_stx_marker,
    bench_parse_unparsed,
    bench_build_structured
);
criterion_main!(benches);
