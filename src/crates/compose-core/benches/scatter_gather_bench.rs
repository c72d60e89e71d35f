use compose_core::{from_fn, Context, Opts, Runnable, ScatterGather, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn build_scatter_gather(worker_count: usize) -> ScatterGather {
    let mut builder = ScatterGather::builder();
    for i in 0..worker_count {
        builder = builder.worker(from_fn(move |_ctx, _input, _opts| {
            Box::pin(async move { Ok(Value::from(i as i64)) })
        }));
    }
    builder
        .aggregator(Arc::new(|_ctx, results| {
            Box::pin(async move {
                let sum: i64 = results.iter().filter_map(|v| v.as_i64()).sum();
                Ok(Value::from(sum))
            })
        }))
        .build()
        .unwrap()
}

fn scatter_gather_fan_out_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for &worker_count in &[4usize, 16, 64] {
        let sg = build_scatter_gather(worker_count);
        c.bench_function(&format!("scatter_gather/{worker_count}_workers"), |b| {
            b.to_async(&runtime).iter(|| async {
                let out = sg
                    .invoke(&Context::new(), black_box(Value::Null), &Opts::new())
                    .await
                    .unwrap();
                black_box(out);
            });
        });
    }
}

criterion_group!(benches, scatter_gather_fan_out_benchmark);
criterion_main!(benches);
