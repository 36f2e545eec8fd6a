//! Benchmarks for row generation and the seeding helpers around it.
//!
//! Tests:
//! - Row generation for a typical table, with and without FK picks
//! - Value picking under each distribution
//! - Reservoir sampling of parent keys
//! - TSV encoding for LOAD DATA

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sql_seeder::generator::{Distribution, GeneratorSetup, RowGenerator, SqlValue, ValuePicker};
use sql_seeder::schema::{Column, Table};
use sql_seeder::seeder::load_data::encode_rows;
use sql_seeder::seeder::Reservoir;
use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

fn users_table() -> Table {
    Table::new(
        "users",
        vec![
            Column::new("id", "bigint unsigned").primary_key(),
            Column::new("email", "varchar(255)").unique(),
            Column::new("first_name", "varchar(64)"),
            Column::new("last_name", "varchar(64)"),
            Column::new("status", "enum('active','banned','pending')"),
            Column::new("score", "decimal(8,2)").nullable(),
            Column::new("created_at", "datetime"),
        ],
    )
}

fn orders_table() -> Table {
    Table::new(
        "orders",
        vec![
            Column::new("id", "int").primary_key(),
            Column::new("user_id", "bigint unsigned").references("users", "id"),
            Column::new("total", "decimal(10,2)"),
            Column::new("note", "text").nullable(),
        ],
    )
}

fn seeded_setup() -> GeneratorSetup {
    GeneratorSetup {
        seed: Some(42),
        ..Default::default()
    }
}

/// Benchmark generating batches of rows
fn bench_generate_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_rows");

    for batch in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("users", batch), &batch, |b, &batch| {
            b.iter(|| {
                let mut generator = RowGenerator::new(&users_table(), seeded_setup()).unwrap();
                black_box(generator.generate_batch(batch).unwrap())
            })
        });

        let parents: Arc<Vec<SqlValue>> = Arc::new((1..=10_000).map(SqlValue::Int).collect());
        group.bench_with_input(BenchmarkId::new("orders_fk", batch), &batch, |b, &batch| {
            b.iter(|| {
                let mut setup = seeded_setup();
                setup.fk_values.insert("user_id".to_string(), Arc::clone(&parents));
                let mut generator = RowGenerator::new(&orders_table(), setup).unwrap();
                black_box(generator.generate_batch(batch).unwrap())
            })
        });
    }

    group.finish();
}

/// Benchmark value picking per distribution
fn bench_value_picker(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_picker");
    let values: Arc<Vec<SqlValue>> = Arc::new((0..10_000).map(SqlValue::Int).collect());
    let picks = 100_000u64;
    group.throughput(Throughput::Elements(picks));

    let distributions = [
        ("uniform", Distribution::Uniform),
        ("zipf", Distribution::Zipf { s: 1.0 }),
        (
            "normal",
            Distribution::Normal {
                mean: 0.5,
                stddev: 0.15,
            },
        ),
        (
            "weighted",
            Distribution::Weighted {
                weights: BTreeMap::from([("0".to_string(), 100.0)]),
            },
        ),
    ];

    for (name, distribution) in distributions {
        let mut rng = StdRng::seed_from_u64(42);
        let picker = ValuePicker::new(Arc::clone(&values), &distribution, &mut rng);
        group.bench_function(name, |b| {
            b.iter(|| {
                for _ in 0..picks {
                    black_box(picker.pick(&mut rng));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark reservoir sampling with varying capacities
fn bench_reservoir(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservoir");
    let item_count = 100_000u64;
    group.throughput(Throughput::Elements(item_count));

    for capacity in [0usize, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("cap", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut reservoir = Reservoir::new(capacity, StdRng::seed_from_u64(42));
                    for i in 0..item_count as i64 {
                        reservoir.consider(black_box(i));
                    }
                    black_box(reservoir.len())
                })
            },
        );
    }

    group.finish();
}

/// Benchmark TSV encoding of generated batches
fn bench_encode_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_rows");
    let mut generator = RowGenerator::new(&users_table(), seeded_setup()).unwrap();
    let rows = generator.generate_batch(10_000).unwrap();
    group.throughput(Throughput::Elements(rows.len() as u64));

    group.bench_function("users_10k", |b| {
        b.iter(|| black_box(encode_rows(black_box(&rows)).len()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_generate_rows,
    bench_value_picker,
    bench_reservoir,
    bench_encode_rows
);
criterion_main!(benches);
