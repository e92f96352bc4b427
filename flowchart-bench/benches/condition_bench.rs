//! Condition set benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowchart_core::{CanonicalKey, ConditionSet};

fn condition_set(size: usize) -> ConditionSet {
    (0..size)
        .map(|i| (format!("flag_{:03}", i), i % 2 == 0))
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_encode");

    for size in [1, 8, 64] {
        let set = condition_set(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &set, |b, set| {
            b.iter(|| black_box(set.encode()))
        });
    }

    // Names that need escaping
    let escaped = ConditionSet::from_pairs([("a:b", true), ("c,d", false), ("e\\f", true)]);
    group.bench_function("escaped", |b| b.iter(|| black_box(escaped.encode())));

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_decode");

    for size in [1, 8, 64] {
        let key = condition_set(size).encode();
        group.throughput(Throughput::Bytes(key.as_str().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &key, |b, key| {
            b.iter(|| black_box(ConditionSet::decode(key.as_str()).unwrap()))
        });
    }

    group.finish();
}

fn bench_satisfies(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_satisfies");

    let context = condition_set(64);
    let required = condition_set(8);
    let missing = required.clone().with("absent", true);

    group.bench_function("hit", |b| {
        b.iter(|| black_box(context.satisfies(black_box(&required))))
    });
    group.bench_function("miss", |b| {
        b.iter(|| black_box(context.satisfies(black_box(&missing))))
    });

    group.finish();
}

fn bench_key_parse(c: &mut Criterion) {
    let key: CanonicalKey = condition_set(8).encode();
    c.bench_function("condition_from_str", |b| {
        b.iter(|| black_box(key.as_str().parse::<ConditionSet>().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_satisfies,
    bench_key_parse
);
criterion_main!(benches);
