//! Series store and chart benchmarks

use std::hint::black_box;

use chrono::{Duration, Local, TimeZone};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vitals_monitor::{
    api::DataResponse, ChartRenderer, RandomWalkGenerator, Sample, SampleSource, SeriesStore,
};

fn filled_store(capacity: usize) -> SeriesStore {
    let mut generator = RandomWalkGenerator::with_seed(1);
    let mut store = SeriesStore::new(capacity);
    for _ in 0..capacity {
        store.append(generator.next_sample());
    }
    store
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_append");
    group.throughput(Throughput::Elements(1));

    for capacity in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut store = filled_store(capacity);
            let base = Local.timestamp_opt(1_700_000_000, 0).unwrap();
            let mut i = 0i64;
            b.iter(|| {
                i += 1;
                store.append(Sample::new(base + Duration::milliseconds(i), 80.0, 98.0));
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_snapshot");

    for capacity in [100usize, 1_000] {
        let store = filled_store(capacity);
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", capacity), &store, |b, store| {
            b.iter(|| black_box(store.snapshot()));
        });
        group.bench_with_input(BenchmarkId::new("data_response", capacity), &store, |b, store| {
            b.iter(|| black_box(DataResponse::from_series(store)));
        });
    }

    group.finish();
}

fn bench_chart(c: &mut Criterion) {
    let renderer = ChartRenderer::default();
    let series = filled_store(100).snapshot();

    c.bench_function("chart_render_base64_100", |b| {
        b.iter(|| black_box(renderer.render_base64(&series)))
    });
}

criterion_group!(benches, bench_append, bench_snapshot, bench_chart);
criterion_main!(benches);
