use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stats_engine::{aggregate, Sample};

fn synthetic(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let t = i as f64 * 0.01;
            Sample::new(t.sin(), t.cos(), (t * 0.5).sin() * 9.81)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    for n in [100, 10_000, 100_000] {
        let samples = synthetic(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &samples, |b, samples| {
            b.iter(|| aggregate(black_box(samples.iter().copied())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
