//! Lumen HEVC 解析性能基准测试.
//!
//! 覆盖起始码扫描、参数集解析与完整解码会话 (仅解析后端).

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use lumen::hevc::parsers::h265::{parse_hevc_sps, split_hevc_annex_b};
use lumen::hevc::testing::{
    PpsParams, SliceParams, SpsParams, StreamBuilder, build_sps_payload,
};
use lumen::hevc::{DecoderConfig, HevcDecoder, NullBackend};

/// 构造 IDR + 299 帧 TRAIL 的码流, 每帧两个 slice
fn make_stream() -> Vec<u8> {
    let mut builder = StreamBuilder::new()
        .sps(&SpsParams::default())
        .pps(&PpsParams::default())
        .slice(&SliceParams {
            payload_len: 2048,
            ..SliceParams::idr()
        });
    for poc in 1..300u32 {
        let slice = SliceParams {
            payload_len: 512,
            ..SliceParams::trail(poc % 256)
        };
        builder = builder
            .aud()
            .slice(&slice)
            .slice(&slice.clone().next_slice(8));
    }
    builder.build()
}

fn bench_split_annex_b(c: &mut Criterion) {
    let stream = make_stream();
    let mut group = c.benchmark_group("annex_b");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("split_300_frames", |b| {
        b.iter(|| {
            let nals = split_hevc_annex_b(black_box(&stream));
            black_box(nals.len());
        });
    });
    group.finish();
}

fn bench_parse_sps(c: &mut Criterion) {
    let payload = build_sps_payload(&SpsParams {
        width: 1920,
        height: 1080,
        short_term_rps: vec![vec![-1], vec![-1, -2], vec![-2, 2], vec![-4, -8, 4]],
        ..SpsParams::default()
    });
    c.bench_function("parse_sps_1080p", |b| {
        b.iter(|| {
            let sps = parse_hevc_sps(black_box(&payload)).unwrap();
            black_box(sps);
        });
    });
}

fn bench_decode_session(c: &mut Criterion) {
    let stream = make_stream();
    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("decode_300_frames_chunked_4k", |b| {
        b.iter(|| {
            let mut dec = HevcDecoder::new(NullBackend::new(), DecoderConfig::default());
            let mut frames = 0usize;
            for chunk in stream.chunks(4096) {
                dec.send_data(black_box(chunk)).unwrap();
                while dec.receive_picture().is_ok() {
                    frames += 1;
                }
            }
            dec.send_eos().unwrap();
            while dec.receive_picture().is_ok() {
                frames += 1;
            }
            black_box(frames);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_split_annex_b,
    bench_parse_sps,
    bench_decode_session,
);
criterion_main!(benches);
