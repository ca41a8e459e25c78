//! # Reconciliation Benchmark
//!
//! Per-tick cost of decoding and applying world updates, and of one
//! prediction frame, at arena sizes well past what a session holds.
//!
//! Run with: `cargo bench --package nebula_networking`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nebula_core::{EntityId, EntitySnapshot, FeedSnapshot, PartialUpdate, Vec2, WorldBounds};
use nebula_networking::protocol::{decode_event, encode_partial_update, events};
use nebula_networking::{MotionPredictor, ReconciliationEngine, RecordingViews, WorldTick};
use serde_json::Value;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn feed(i: usize) -> EntitySnapshot {
    EntitySnapshot::Feed(FeedSnapshot {
        id: EntityId(i as u64),
        size: 10.0,
        position: Vec2::new(i as f32 % 1000.0, i as f32 / 1000.0),
    })
}

fn update(i: usize) -> PartialUpdate {
    PartialUpdate {
        id: EntityId(i as u64),
        size: 10.0,
        heading: Vec2::new(1.0, 0.0),
        traction: 0.5,
        position: Vec2::new(i as f32 % 1000.0 + 1.0, i as f32 / 1000.0),
        score: 0.0,
    }
}

fn populated(count: usize) -> ReconciliationEngine<RecordingViews> {
    let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
    engine.apply_tick(&WorldTick {
        added: (0..count).map(feed).collect(),
        ..WorldTick::default()
    });
    engine
}

/// Benchmark: full snapshot into an empty registry.
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_snapshot");

    for count in SIZES {
        let tick = WorldTick {
            added: (0..count).map(feed).collect(),
            current_ids: Some((0..count as u64).map(EntityId).collect()),
            ..WorldTick::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(count), &tick, |b, tick| {
            b.iter(|| {
                let mut engine = ReconciliationEngine::new(RecordingViews::lifecycle_only());
                black_box(engine.apply_tick(tick))
            });
        });
    }

    group.finish();
}

/// Benchmark: changed objects plus eviction of a tenth of the arena.
fn bench_changed_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_changed_evict_10pct");

    for count in SIZES {
        let current: HashSet<EntityId> = (0..count as u64)
            .filter(|i| i % 10 != 0)
            .map(EntityId)
            .collect();
        let tick = WorldTick {
            changed: (0..count).map(update).collect(),
            current_ids: Some(current),
            ..WorldTick::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(count), &tick, |b, tick| {
            b.iter_batched(
                || populated(count),
                |mut engine| black_box(engine.apply_tick(tick)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: decoding an `world.updatePlayers` payload.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_update_players");

    for count in SIZES {
        let payload = Value::Array(
            (0..count)
                .map(|i| Value::Array(encode_partial_update(&update(i))))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| black_box(decode_event(events::UPDATE_PLAYERS, payload)));
        });
    }

    group.finish();
}

/// Benchmark: one prediction frame over every entity.
fn bench_predict_frame(c: &mut Criterion) {
    let predictor = MotionPredictor::default();
    let bounds = WorldBounds::default();
    let mut group = c.benchmark_group("predict_frame");

    for count in SIZES {
        let mut engine = populated(count);
        let (registry, _) = engine.parts_mut();
        for i in 0..count {
            if let Some(entity) = registry.get_mut(EntityId(i as u64)) {
                entity.heading = Vec2::new(0.0, 1.0);
                entity.traction = 1.0;
            }
        }
        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| {
                let (registry, _) = engine.parts_mut();
                for entity in registry.all_mut() {
                    predictor.step(entity, 1.0 / 30.0, 240.0, &bounds);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_snapshot,
    bench_changed_with_eviction,
    bench_decode,
    bench_predict_frame,
);
criterion_main!(benches);
