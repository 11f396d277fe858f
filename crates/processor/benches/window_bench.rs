//! 윈도우 할당 및 집계 벤치마크

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use tideway_core::event::StreamEvent;
use tideway_processor::{
    AggregationConfig, AggregationType, StreamProcessor, StreamProcessorConfig, Transform,
    WindowConfig,
};

fn make_events(count: usize) -> Vec<StreamEvent> {
    (0..count)
        .map(|i| {
            StreamEvent::new(
                format!("sensor-{}", i % 8),
                json!({"sensor": i % 8, "reading": (i * 37) % 1000}),
                (i as i64) * 10,
            )
        })
        .collect()
}

fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_window");
    let configs = [
        ("tumbling", WindowConfig::tumbling(1_000)),
        ("sliding", WindowConfig::sliding(1_000, 250)),
        ("session", WindowConfig::session(50)),
    ];
    for size in [1_000usize, 10_000] {
        let events = make_events(size);
        group.throughput(Throughput::Elements(size as u64));
        for (name, config) in &configs {
            group.bench_with_input(BenchmarkId::new(*name, size), &events, |b, events| {
                b.iter(|| {
                    let mut processor = StreamProcessor::new(StreamProcessorConfig::default());
                    black_box(processor.process_window(events.clone(), config).unwrap())
                });
            });
        }
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let events = make_events(10_000);
    let mut processor = StreamProcessor::new(StreamProcessorConfig::default());
    let windows = processor
        .process_window(events, &WindowConfig::tumbling(1_000))
        .unwrap();

    let mut group = c.benchmark_group("aggregate");
    for (name, aggregation) in [
        ("avg", AggregationType::Avg),
        ("p95", AggregationType::Percentile { p: 95.0 }),
        ("stddev", AggregationType::StdDev),
    ] {
        let config = AggregationConfig::new(aggregation)
            .field("reading")
            .group_by("sensor");
        group.bench_function(name, |b| {
            b.iter(|| black_box(processor.aggregate(&windows, &config).unwrap()));
        });
    }
    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let events = make_events(10_000);
    let processor = StreamProcessor::new(StreamProcessorConfig::default());
    let native = Transform::filter(|e: &StreamEvent, _| {
        e.numeric_field("reading").is_some_and(|v| v > 500.0)
    });
    let expr = Transform::filter_expr("event.value.reading > 500");

    let mut group = c.benchmark_group("filter");
    group.bench_function("native", |b| {
        b.iter(|| black_box(processor.transform(&events, &native).unwrap()));
    });
    group.bench_function("expression", |b| {
        b.iter(|| black_box(processor.transform(&events, &expr).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_windows, bench_aggregate, bench_transform);
criterion_main!(benches);
