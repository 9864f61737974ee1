//! Benchmarks for the schema pipeline
//!
//! Every `content` message a client receives is parsed and rebuilt into a graph from scratch,
//! so these measure the per-update cost on schemas of increasing size.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use schemaflow::{graph::build, parser::parse, protocol};

/// A schema with `models` models, each related to the previous one, plus a few enums.
fn generate_schema(models: usize) -> String {
    let mut text = String::from("datasource db {\n  provider = \"postgresql\"\n}\n\n");
    for i in 0..models {
        text.push_str(&format!("model Model{i} {{\n"));
        text.push_str("  id        Int      @id @default(autoincrement())\n");
        text.push_str("  name      String?\n");
        text.push_str("  createdAt DateTime @default(now())\n");
        if i > 0 {
            text.push_str(&format!("  parent    Model{}\n", i - 1));
            text.push_str("  parentId  Int\n");
        }
        text.push_str("  status    Status0\n}\n\n");
    }
    for i in 0..(models / 10).max(1) {
        text.push_str(&format!(
            "enum Status{i} {{\n  ACTIVE\n  INACTIVE\n  ARCHIVED\n}}\n\n"
        ));
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for size in [10usize, 100, 1000] {
        let text = generate_schema(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| parse(black_box(text)))
        });
    }
    group.finish();
}

fn bench_parse_and_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_build");
    for size in [10usize, 100, 1000] {
        let text = generate_schema(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| build(&parse(black_box(text))))
        });
    }
    group.finish();
}

fn bench_content_frame(c: &mut Criterion) {
    let frame = protocol::encode(&protocol::SyncMessage::Content {
        data: generate_schema(100),
    })
    .unwrap();

    c.bench_function("decode_content_frame", |b| {
        b.iter(|| protocol::decode(black_box(&frame)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_parse_and_build,
    bench_content_frame
);
criterion_main!(benches);
