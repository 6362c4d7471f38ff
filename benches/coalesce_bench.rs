//! Batch coalescing and catalog commit benchmarks.

#[path = "../src/test_support.rs"]
mod test_support;

use boardcanon::model::SearchRun;
use boardcanon::store::{commit_run, Store};
use boardcanon::{identify_boards, Normalizer, PersistentStore};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use test_support::generate_batch;

fn bench_identify_boards(c: &mut Criterion) {
    let mut group = c.benchmark_group("identify_boards");
    group.sample_size(20);

    for &count in &[1_000usize, 10_000, 50_000] {
        let records = generate_batch(count, 42);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| black_box(identify_boards(records, Normalizer::shared())))
        });
    }
    group.finish();
}

fn bench_commit_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_run");
    group.sample_size(10);

    let records = generate_batch(5_000, 9);
    let groups = identify_boards(&records, Normalizer::shared());
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("in_memory", |b| {
        b.iter_batched(
            Store::new,
            |mut store| {
                let run = SearchRun::new("bench");
                black_box(commit_run(&mut store, &run, &groups).ok())
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("rocksdb", |b| {
        b.iter_batched(
            || {
                let dir = tempfile::tempdir().expect("tempdir");
                let store = PersistentStore::open(dir.path()).expect("open store");
                (dir, store)
            },
            |(_dir, mut store)| {
                let run = SearchRun::new("bench");
                black_box(commit_run(&mut store, &run, &groups).ok())
            },
            BatchSize::PerIteration,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_identify_boards, bench_commit_run);
criterion_main!(benches);
