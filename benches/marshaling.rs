//! Criterion measurements of parameter inference, the prepared insert path
//! and cell decoding, all against the in-memory engine so only the session
//! layer's own overhead is measured.

use std::hint::black_box;
use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use intarkdb_middleware::prelude::*;
use intarkdb_middleware::test_utils::MemoryEngine;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// Deterministic rows so every run measures the same workload.
fn generate_rows(count: usize) -> Vec<Vec<RowValues>> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
    (0..count)
        .map(|i| {
            let day = base + chrono::Days::new(rng.random_range(0..2000));
            vec![
                RowValues::Int(i64::try_from(i).unwrap_or(i64::MAX)),
                RowValues::Int(rng.random_range(-40_000..40_000_i64)),
                RowValues::Text(format!("text-{}", rng.random_range(1..1000))),
                RowValues::Float(rng.random_range(0.0..1000.0)),
                RowValues::Bool(rng.random_bool(0.5)),
                RowValues::Date(day),
            ]
        })
        .collect()
}

fn fresh_connection() -> Connection {
    let driver = Driver::new(Arc::new(MemoryEngine::local()));
    let conn = driver
        .connect(&ConnectOptions::local("bench"))
        .expect("memory engine connects");
    conn.execute("CREATE TABLE b (id BIGINT, n INTEGER, label VARCHAR, score DOUBLE, ok BOOLEAN, day DATE)")
        .expect("create bench table");
    conn
}

fn bench_infer(c: &mut Criterion) {
    let rows = generate_rows(1000);
    let mut group = c.benchmark_group("type_inference");
    group.throughput(Throughput::Elements(rows.len() as u64 * 6));
    group.bench_function("infer", |b| {
        b.iter(|| {
            for row in &rows {
                for value in row {
                    black_box(TypeKind::infer(value));
                }
            }
        });
    });
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepared_insert");
    for size in [10_usize, 100, 1000] {
        let rows = generate_rows(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter_with_setup(fresh_connection, |conn| {
                conn.execute_many("INSERT INTO b VALUES (?, ?, ?, ?, ?, ?)", rows)
                    .expect("insert rows");
            });
        });
    }
    group.finish();
}

fn bench_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_fetch_all");
    for size in [10_usize, 100, 1000] {
        let conn = fresh_connection();
        conn.execute_many("INSERT INTO b VALUES (?, ?, ?, ?, ?, ?)", &generate_rows(size))
            .expect("seed rows");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let rows = conn
                    .execute("SELECT * FROM b")
                    .and_then(|cursor| cursor.fetch_all())
                    .expect("fetch rows");
                black_box(rows.len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_infer, bench_insert, bench_fetch);
criterion_main!(benches);
