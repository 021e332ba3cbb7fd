//! Benchmarks for flow execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stepflow::prelude::*;
use tokio::runtime::Runtime;

fn chain(len: usize) -> Flow<u64, u64> {
    (0..len).fold(Flow::new(), |flow, _| {
        flow.step(|n: u64, _ctx| async move { Ok(n.wrapping_add(1)) })
    })
}

fn flow_benchmark(c: &mut Criterion) {
    let Ok(rt) = Runtime::new() else {
        return;
    };

    let short = chain(4);
    c.bench_function("run_4_steps", |b| {
        b.iter(|| rt.block_on(short.run(black_box(1))))
    });

    let long = chain(64);
    c.bench_function("run_64_steps", |b| {
        b.iter(|| rt.block_on(long.run(black_box(1))))
    });

    let grouped = Flow::new().group(vec![
        from_fn(|n: u64, _ctx| async move { Ok(n + 1) }),
        from_fn(|n: u64, _ctx| async move { Ok(n + 2) }),
        from_fn(|n: u64, _ctx| async move { Ok(n + 3) }),
    ]);
    c.bench_function("run_group_3", |b| {
        b.iter(|| rt.block_on(grouped.run(black_box(1))))
    });

    let inputs: Vec<u64> = (0..256).collect();
    c.bench_function("run_many_256_bounded_8", |b| {
        b.iter(|| {
            rt.block_on(short.run_many(
                black_box(inputs.clone()),
                BatchOptions::new().with_concurrency(8),
            ))
        })
    });

    c.bench_function("extend_shared_prefix", |b| {
        b.iter(|| black_box(long.step(|n: u64, _ctx| async move { Ok(n) }).len()))
    });
}

criterion_group!(benches, flow_benchmark);
criterion_main!(benches);
