use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use timegrid::stream::{drain, from_iter};
use timegrid::{align, align_and_delta, fill_gaps_linear, AlignmentPeriod, Sample, StreamContext};

fn samples(n: i64, step: i64) -> Vec<Sample<f64>> {
    (0..n)
        .map(|i| {
            Sample::new(
                Utc.timestamp_opt(i * step + 7, 0).unwrap(),
                100.0 + i as f64,
            )
        })
        .collect()
}

fn bench_align(c: &mut Criterion) {
    let ctx = StreamContext::new();
    let period = AlignmentPeriod::fixed(Duration::seconds(60), Utc);
    let input = samples(10_000, 20);
    c.bench_function("align_10k_samples_60s", |b| {
        b.iter(|| {
            let mut aligned = align(from_iter(black_box(input.clone())), period.clone());
            drain(&mut aligned, &ctx).unwrap()
        })
    });
}

fn bench_align_and_delta(c: &mut Criterion) {
    let ctx = StreamContext::new();
    let period = AlignmentPeriod::fixed(Duration::seconds(60), Utc);
    let input = samples(10_000, 20);
    c.bench_function("align_and_delta_10k_samples_60s", |b| {
        b.iter(|| {
            let mut pipeline = align_and_delta(from_iter(black_box(input.clone())), period.clone());
            drain(&mut pipeline, &ctx).unwrap()
        })
    });
}

fn bench_fill_gaps(c: &mut Criterion) {
    let ctx = StreamContext::new();
    let period = AlignmentPeriod::fixed(Duration::seconds(60), Utc);
    // sparse aligned input, one sample every 10 minutes
    let input: Vec<Sample<f64>> = (0..1_000)
        .map(|i| Sample::new(Utc.timestamp_opt(i * 600, 0).unwrap(), i as f64))
        .collect();
    c.bench_function("fill_gaps_linear_1k_sparse_60s", |b| {
        b.iter(|| {
            let mut filled = fill_gaps_linear(from_iter(black_box(input.clone())), period.clone());
            drain(&mut filled, &ctx).unwrap()
        })
    });
}

criterion_group!(benches, bench_align, bench_align_and_delta, bench_fill_gaps);
criterion_main!(benches);
