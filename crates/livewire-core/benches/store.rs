//! Store benchmarks for livewire-core.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use tenvis_livewire_core::{Category, EntityId, InboundEvent, LiveEntityStore};
use tokio::runtime::{Builder, Runtime};

/// Worker runtime that keeps draining aborted expiry timers.
fn runtime() -> Runtime {
    Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .unwrap()
}

/// Benchmark refreshing an already-live entity.
fn bench_refresh(c: &mut Criterion) {
    let runtime = runtime();
    let _enter = runtime.enter();
    let store = LiveEntityStore::new().unwrap();
    let id = EntityId::new("m1").unwrap();

    c.bench_function("refresh_single_entity", |b| {
        b.iter(|| store.update_entity(Category::Motors, black_box(id.clone()), None, json!(0.5)))
    });
}

/// Benchmark updates spread across many entities.
fn bench_update_many(c: &mut Criterion) {
    let runtime = runtime();
    let _enter = runtime.enter();
    let store = LiveEntityStore::new().unwrap();
    let ids: Vec<EntityId> = (0..1000).map(EntityId::from).collect();

    let mut group = c.benchmark_group("update_many");
    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("1000_entities", |b| {
        b.iter(|| {
            for id in &ids {
                store.update_entity(Category::Peripherals, id.clone(), None, json!(true));
            }
        })
    });
    group.finish();
}

/// Benchmark listener fan-out cost per update.
fn bench_fanout(c: &mut Criterion) {
    let runtime = runtime();
    let _enter = runtime.enter();
    let store = LiveEntityStore::new().unwrap();
    let _subscriptions: Vec<_> = (0..10).map(|_| store.subscribe(|| {})).collect();
    let id = EntityId::new("m1").unwrap();

    c.bench_function("update_ten_listeners", |b| {
        b.iter(|| store.update_entity(Category::Motors, id.clone(), None, json!(0.5)))
    });
}

/// Benchmark snapshot copies.
fn bench_snapshot(c: &mut Criterion) {
    let runtime = runtime();
    let _enter = runtime.enter();
    let store = LiveEntityStore::new().unwrap();
    for n in 0..100 {
        store.update_entity(Category::Motors, EntityId::from(n), None, json!(n));
    }

    let mut group = c.benchmark_group("snapshot");
    group.throughput(Throughput::Elements(100));
    group.bench_function("100_motors", |b| b.iter(|| black_box(store.motors())));
    group.finish();
}

/// Benchmark decoding and dispatching an inbound event.
fn bench_dispatch(c: &mut Criterion) {
    let runtime = runtime();
    let _enter = runtime.enter();
    let store = LiveEntityStore::new().unwrap();
    let raw = r#"{"type":"UPDATE_ENTITY_STRUCT","entity":{"id":"p1","kind":"SENSOR_SCALAR","value":21.5}}"#;

    c.bench_function("decode_and_dispatch", |b| {
        b.iter(|| {
            let event: InboundEvent = serde_json::from_str(black_box(raw)).unwrap();
            store.dispatch(event).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_refresh,
    bench_update_many,
    bench_fanout,
    bench_snapshot,
    bench_dispatch
);
criterion_main!(benches);
