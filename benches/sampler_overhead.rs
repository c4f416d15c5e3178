//! Benchmarks for the per-sample and per-unit overhead of the admission path
//!
//! This benchmark measures:
//! - Reading process CPU time via getrusage
//! - Utilization arithmetic
//! - Single-slot publish / take
//! - Gate evaluation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idle_gate::sampler::{slot, utilization_between};
use idle_gate::{AdmissionGate, CpuTime, CpuTimeSource, RusageCpuTime, UtilizationSample};
use std::time::Duration;

fn bench_cpu_time(c: &mut Criterion) {
    let source = RusageCpuTime::new();
    c.bench_function("rusage_cpu_time", |b| {
        b.iter(|| black_box(source.cpu_time().ok()))
    });
}

fn bench_utilization(c: &mut Criterion) {
    let before = CpuTime::new(Duration::from_millis(1_000), Duration::from_millis(200));
    let after = CpuTime::new(Duration::from_millis(1_120), Duration::from_millis(230));
    let wall = Duration::from_millis(100);
    c.bench_function("utilization_between", |b| {
        b.iter(|| utilization_between(black_box(before), black_box(after), black_box(wall)))
    });
}

fn bench_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_slot");
    let (tx, mut rx) = slot::channel();

    group.bench_function("publish_replace", |b| {
        b.iter(|| tx.publish(black_box(UtilizationSample::new(0.5))))
    });

    group.bench_function("publish_then_take", |b| {
        b.iter(|| {
            tx.publish(black_box(UtilizationSample::new(0.5)));
            black_box(rx.try_recv().ok())
        })
    });

    group.bench_function("take_empty", |b| b.iter(|| black_box(rx.try_recv().is_err())));

    group.finish();
}

fn bench_gate(c: &mut Criterion) {
    let samples: Vec<UtilizationSample> = [2.0, 0.5, 0.3, 2.0, 0.1, -1.0]
        .iter()
        .copied()
        .map(UtilizationSample::new)
        .collect();
    c.bench_function("gate_observe", |b| {
        let mut gate = AdmissionGate::new(1.5).unwrap();
        b.iter(|| {
            for s in &samples {
                black_box(gate.observe(*s));
            }
        })
    });
}

criterion_group!(benches, bench_cpu_time, bench_utilization, bench_slot, bench_gate);
criterion_main!(benches);
