//! Benchmarks for complete seeding runs.
//!
//! Tests:
//! - Full run into the in-memory store at growing scales
//! - Weighted customer sampling from the reference pool

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rental_seed::pool::ReferencePool;
use rental_seed::schema::{rental_schema, EntityKind};
use rental_seed::seed::{run, SeedConfig};
use rental_seed::storage::{Key, MemoryStorage, Storage};
use std::hint::black_box;
use synth::ListSource;

fn scaled_config(scale: usize) -> SeedConfig {
    let mut config = SeedConfig::default();
    let counts = &mut config.counts;
    counts.actors *= scale;
    counts.films *= scale;
    counts.addresses *= scale;
    counts.customers *= scale;
    counts.inventory *= scale;
    counts.rentals *= scale;
    counts.payments *= scale;
    config
}

/// Benchmark a full run with every count multiplied by the scale
fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(20);

    let registry = rental_schema();
    let order = registry.dependency_order().unwrap_or_default();

    for scale in [1, 10, 50] {
        let config = scaled_config(scale);
        let rows = (config.counts.rentals + config.counts.payments + config.counts.inventory) as u64;
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(
            BenchmarkId::new("memory", format!("x{}", scale)),
            &config,
            |b, config| {
                b.iter(|| {
                    let mut storage = MemoryStorage::new();
                    storage.create_structures(&registry, &order).unwrap();
                    let report = run(
                        &registry,
                        &mut storage,
                        ListSource::seeded(42),
                        config.clone(),
                    )
                    .unwrap();
                    black_box(report.total_rows)
                })
            },
        );
    }

    group.finish();
}

/// Benchmark weighted sampling over a large customer pool
fn bench_weighted_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_sampling");

    for customers in [100, 10_000] {
        let mut pool = ReferencePool::new();
        for id in 1..=customers {
            let key = Key::Id(id);
            pool.record_inserted(EntityKind::Customer, key);
            pool.record_weight(EntityKind::Customer, key, if id % 10 == 0 { 0.2 } else { 1.0 });
        }

        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(
            BenchmarkId::new("customers", customers),
            &pool,
            |b, pool| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(7);
                    for _ in 0..1_000 {
                        black_box(pool.sample_weighted(EntityKind::Customer, &mut rng).unwrap());
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_full_run, bench_weighted_sampling);
criterion_main!(benches);
