//! Measures the overhead of entering and exiting spans.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use scope_timer::Stopwatch;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_timer");

    // Rounds stay open for the whole measurement, so traces must be bounded.
    let stopwatch = Stopwatch::builder()
        .max_traces_per_name(1000)
        .export_aggregated(|report| {
            black_box(report);
            Ok(())
        })
        .build();

    group.bench_function("round_with_root_only", |b| {
        b.iter(|| {
            let _root = stopwatch.timer("root");
        });
    });

    group.bench_function("nested_span_in_open_round", |b| {
        let _root = stopwatch.timer("root");

        b.iter(|| {
            let _span = stopwatch.timer(black_box("nested"));
        });
    });

    group.bench_function("explicit_enter_exit", |b| {
        let _root = stopwatch.timer("root");

        b.iter(|| {
            stopwatch.enter("nested");
            black_box(stopwatch.exit().unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, entrypoint);
criterion_main!(benches);
