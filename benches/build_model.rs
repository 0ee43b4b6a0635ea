//! Benchmarks for symbolic model assembly.
//!
//! Run with: cargo bench --bench build_model
//!
//! No solver runs here; these track the pure-Rust cost of allocating the
//! variable pool and emitting constraints as the horizon, the CCA, and the
//! period vary. Solve time itself belongs to Z3 and is reported per query by
//! `SolveReport::elapsed`.

use std::hint::black_box;

use chokepoint::export::write_constraints;
use chokepoint::periodic::make_periodic;
use chokepoint::{cca, model};
use chokepoint::{CcaKind, ModelConfig, Query};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn config_for(cca: CcaKind, horizon: usize) -> ModelConfig {
    ModelConfig::builder()
        .with_cca(cca)
        .with_horizon(horizon)
        .with_calculate_qdel(cca.requires_qdel())
        .build()
        .expect("benchmark configuration is valid")
}

fn bench_base_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("base model");

    for horizon in [5usize, 10, 20, 40] {
        let config = config_for(CcaKind::ConstRate, horizon);
        group.bench_with_input(BenchmarkId::new("build", horizon), &config, |b, config| {
            b.iter(|| model::build(black_box(config)));
        });
    }

    group.finish();
}

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("assembly");

    // Build plus encode, the unit every scenario constructor pays.
    for kind in CcaKind::ALL {
        let config = config_for(kind, 10);
        group.bench_with_input(BenchmarkId::new("assemble", kind), &config, |b, config| {
            b.iter(|| {
                let (mut constraints, mut vars) =
                    model::build(black_box(config)).expect("model builds");
                constraints.extend(cca::encode(config, &mut vars).expect("CCA encodes"));
                constraints
            });
        });
    }

    group.finish();
}

fn bench_periodic(c: &mut Criterion) {
    let mut group = c.benchmark_group("periodicity");

    let config = config_for(CcaKind::ConstRate, 10);
    let (_, vars) = model::build(&config).expect("model builds");
    for period in [1usize, 2, 5, 10] {
        group.bench_with_input(
            BenchmarkId::new("make_periodic", period),
            &period,
            |b, &period| {
                b.iter(|| make_periodic(black_box(&config), &vars, period));
            },
        );
    }

    group.finish();
}

fn bench_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("SMT-LIB dump");

    let config = config_for(CcaKind::Aimd, 10);
    let (mut constraints, mut vars) = model::build(&config).expect("model builds");
    constraints.extend(cca::encode(&config, &mut vars).expect("CCA encodes"));
    let query = Query::new(constraints);
    group.bench_function("write_constraints", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(1 << 16);
            write_constraints(&mut out, black_box(&vars), black_box(&query))
                .expect("in-memory writes cannot fail");
            out
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_base_model,
    bench_assembly,
    bench_periodic,
    bench_dump
);
criterion_main!(benches);
