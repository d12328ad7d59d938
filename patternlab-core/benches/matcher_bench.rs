//! Criterion benchmarks for PatternLab hot paths.
//!
//! Benchmarks:
//! 1. DTW distance per algorithm and length
//! 2. Envelope construction and LB_Keogh
//! 3. Full query against libraries of increasing size (pruned vs exhaustive)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use patternlab_core::distance::{DistanceEngine, DtwAlgorithm};
use patternlab_core::domain::{Bar, TemplateMetadata};
use patternlab_core::{PatternLibrary, PatternMatcher};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_signal(n: usize, phase: f64) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.2 + phase).sin()).collect()
}

fn make_bars(n: usize, phase: f64) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.15 + phase).sin() * 10.0;
            Bar {
                timestamp: base + chrono::Duration::minutes(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

fn make_library(templates: usize, len: usize) -> PatternLibrary {
    let mut lib = PatternLibrary::default();
    for i in 0..templates {
        let label = format!("pattern_{}", i % 4);
        lib.add_pattern(label, &make_bars(len, i as f64 * 0.37), TemplateMetadata::default())
            .unwrap();
    }
    lib.build_index(None);
    lib
}

// ── 1. Distance ──────────────────────────────────────────────────────

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("dtw_distance");

    for &len in &[50, 100, 200] {
        let a = make_signal(len, 0.0);
        let b = make_signal(len, 0.8);
        for algo in [
            DtwAlgorithm::DerivativeSakoeChiba { window: 0.15 },
            DtwAlgorithm::StandardAmercing { window: 0.5, penalty: 1.0 },
            DtwAlgorithm::Standard,
        ] {
            let engine = DistanceEngine::new(algo);
            group.bench_with_input(BenchmarkId::new(algo.name(), len), &len, |bench, _| {
                bench.iter(|| engine.distance(black_box(&a), black_box(&b)));
            });
        }
    }

    group.finish();
}

// ── 2. Bounds ────────────────────────────────────────────────────────

fn bench_lb_keogh(c: &mut Criterion) {
    let mut group = c.benchmark_group("lb_keogh");
    let engine = DistanceEngine::default();
    let template = make_signal(200, 0.0);
    let query = make_signal(200, 0.5);
    let envelope = engine.envelopes(&template, None);

    group.bench_function("envelopes_200", |b| {
        b.iter(|| engine.envelopes(black_box(&template), None));
    });
    group.bench_function("bound_200", |b| {
        b.iter(|| engine.lb_keogh(black_box(&query), black_box(&envelope)));
    });

    group.finish();
}

// ── 3. Matcher ───────────────────────────────────────────────────────

fn bench_find_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_matches");
    let query_bars = make_bars(60, 1.1);

    for &size in &[50, 200] {
        let mut lib = make_library(size, 60);
        let query = lib.preprocessor().normalize_pattern(&query_bars);
        let pruned = PatternMatcher::default();
        let exhaustive = PatternMatcher::default().with_lb_keogh(false);

        group.bench_with_input(BenchmarkId::new("pruned", size), &size, |b, _| {
            b.iter(|| pruned.find_matches(&mut lib, black_box(&query), 0.0));
        });
        group.bench_with_input(BenchmarkId::new("exhaustive", size), &size, |b, _| {
            b.iter(|| exhaustive.find_matches(&mut lib, black_box(&query), 0.0));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_distance, bench_lb_keogh, bench_find_matches);
criterion_main!(benches);
