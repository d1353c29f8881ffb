// Criterion benchmarks for the ssrbridge-common frame codec
//
// Run benchmarks with:
//   cargo bench -p ssrbridge-common

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use ssrbridge_common::transport::{FrameReader, JsonCodec, FRAME_TAG};
use ssrbridge_common::{RenderRequest, RenderResponse, RenderedPage};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let request = RenderRequest::new(json!({
        "component": "Home",
        "props": {"name": "Ada", "items": [1, 2, 3]},
        "url": "/",
    }));
    group.bench_function("request", |b| {
        b.iter(|| JsonCodec::encode_request(black_box(&request)).unwrap());
    });

    for size in [1_000usize, 100_000, 900_000] {
        let response = RenderResponse::success(RenderedPage::new(
            vec!["<title>Bench</title>".into()],
            "x".repeat(size),
        ));
        group.bench_with_input(BenchmarkId::new("response", size), &response, |b, response| {
            b.iter(|| JsonCodec::encode_response(black_box(response)).unwrap());
        });
    }

    group.finish();
}

fn bench_read_frames(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut input = Vec::new();
    for i in 0..100 {
        input.extend_from_slice(format!("[LOG] noise {i}\n").as_bytes());
        input.extend_from_slice(format!("{FRAME_TAG}{{\"ok\":true,\"body\":\"{i}\"}}\n").as_bytes());
    }

    c.bench_function("read_100_frames_with_noise", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut reader = FrameReader::new(tokio::io::BufReader::new(&input[..]));
                let mut count = 0;
                while let Some(_frame) = reader.next_frame().await.unwrap() {
                    count += 1;
                }
                black_box(count)
            })
        });
    });
}

criterion_group!(benches, bench_encode, bench_read_frames);
criterion_main!(benches);
