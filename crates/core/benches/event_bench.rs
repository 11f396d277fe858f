//! 이벤트 벤치마크
//!
//! StreamEvent 생성, 필드 조회, 바이트 인코딩 성능을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use tideway_core::event::StreamEvent;
use tideway_core::notify::Notifier;

fn create_event() -> StreamEvent {
    StreamEvent::new(
        "order-1001",
        json!({
            "amount": 249.99,
            "currency": "EUR",
            "customer": {"id": "c-77", "tier": "gold"},
            "items": [{"sku": "A-1", "qty": 2}, {"sku": "B-9", "qty": 1}],
        }),
        1_700_000_000_000,
    )
    .with_metadata("source", "checkout")
}

fn bench_event_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("stream_event_new", |b| b.iter(|| black_box(create_event())));

    group.finish();
}

fn bench_field_lookup(c: &mut Criterion) {
    let event = create_event();
    let mut group = c.benchmark_group("field_lookup");
    group.throughput(Throughput::Elements(1));

    group.bench_function("nested_path", |b| {
        b.iter(|| black_box(&event).field(black_box("customer.tier")))
    });

    group.bench_function("array_index_path", |b| {
        b.iter(|| black_box(&event).numeric_field(black_box("items.1.qty")))
    });

    group.bench_function("group_key_two_fields", |b| {
        b.iter(|| black_box(&event).group_key(black_box(&["customer.id", "currency"])))
    });

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let event = create_event();
    let encoded = event.to_bytes().unwrap();

    let mut group = c.benchmark_group("event_codec");
    group.throughput(Throughput::Elements(1));

    group.bench_function("to_bytes", |b| b.iter(|| black_box(&event).to_bytes().unwrap()));

    group.bench_function("from_bytes", |b| {
        b.iter(|| StreamEvent::from_bytes(black_box(&encoded)).unwrap())
    });

    group.finish();
}

fn bench_notifier(c: &mut Criterion) {
    let notifier = Notifier::<StreamEvent>::new(1024);
    let mut rx = notifier.subscribe();
    let event = create_event();

    let mut group = c.benchmark_group("notifier");
    group.throughput(Throughput::Elements(1));

    group.bench_function("emit_and_recv", |b| {
        b.iter(|| {
            notifier.emit(black_box(event.clone()));
            let _ = rx.try_recv();
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_event_creation,
    bench_field_lookup,
    bench_codec,
    bench_notifier
);
criterion_main!(benches);
