//! Benchmarks for model normalization and identity derivation.

#[path = "../src/test_support.rs"]
mod test_support;

use boardcanon::brand;
use boardcanon::identity::{BoardIdentifier, IdentityInput};
use boardcanon::normalize::{NormalizeOptions, Normalizer};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use test_support::generate_titles;

// =============================================================================
// NORMALIZER BENCHMARKS
// =============================================================================

/// Full pipeline over generated retailer titles.
fn bench_normalize_titles(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    group.sample_size(50);
    group.warm_up_time(Duration::from_millis(500));

    let normalizer = Normalizer::shared();
    for &count in &[100usize, 1_000, 10_000] {
        let titles: Vec<_> = generate_titles(count, 42)
            .into_iter()
            .map(|noisy| (brand::canonicalize(noisy.brand), noisy.title))
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("titles", count), &titles, |b, titles| {
            b.iter(|| {
                for (brand, title) in titles {
                    black_box(normalizer.normalize(
                        title,
                        Some(brand),
                        NormalizeOptions::default(),
                    ));
                }
            })
        });
    }
    group.finish();
}

/// Compiling the shipped rule table.
fn bench_rule_compile(c: &mut Criterion) {
    c.bench_function("normalizer_builtin", |b| {
        b.iter(|| black_box(Normalizer::builtin()))
    });
}

// =============================================================================
// IDENTITY BENCHMARKS
// =============================================================================

/// Key derivation, which touches the brand, model and gender facets.
fn bench_identity_key(c: &mut Criterion) {
    let normalizer = Normalizer::shared();
    let titles = generate_titles(1_000, 7);
    let mut group = c.benchmark_group("identity");
    group.throughput(Throughput::Elements(titles.len() as u64));
    group.bench_function("key", |b| {
        b.iter(|| {
            for noisy in &titles {
                let identity =
                    BoardIdentifier::new(IdentityInput::new(&noisy.title, noisy.brand), normalizer);
                black_box(identity.key());
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_normalize_titles,
    bench_rule_compile,
    bench_identity_key
);
criterion_main!(benches);
