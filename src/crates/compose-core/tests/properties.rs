//! Property-based checks generalizing the testable properties exercised by
//! the example-based seed scenarios already covered unit-by-unit in each
//! module. Each property runs against randomly generated worker counts,
//! middleware stacks, or chain lengths rather than a fixed example.

use compose_core::{
    apply_middleware, from_fn, Chain, Context, Middleware, Opts, Runnable, ScatterGather, Value,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn labelled_middleware(name: usize, log: Arc<Mutex<Vec<String>>>) -> Middleware {
    Arc::new(move |inner| {
        let log = log.clone();
        from_fn(move |ctx, input, opts| {
            let log = log.clone();
            let inner = inner.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name}-before"));
                let out = inner.invoke(&ctx, input, &opts).await;
                log.lock().unwrap().push(format!("{name}-after"));
                out
            })
        })
    })
}

proptest! {
    /// Property 5: Scatter/Gather results[i] is worker[i]'s output
    /// regardless of worker completion order, for any worker count and any
    /// permutation of artificial per-worker delays.
    #[test]
    fn ordering_survives_arbitrary_completion_order(
        delays_ms in prop::collection::vec(0u64..20, 1..12),
    ) {
        let rt = runtime();
        let result: Result<(), TestCaseError> = rt.block_on(async move {
            let mut builder = ScatterGather::builder();
            for (index, delay) in delays_ms.iter().enumerate() {
                let delay = *delay;
                builder = builder.worker(from_fn(move |_ctx, _input, _opts| {
                    Box::pin(async move {
                        if delay > 0 {
                            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                        }
                        Ok(Value::from(index as i64))
                    })
                }));
            }
            let collect: compose_core::Aggregator =
                Arc::new(|_ctx, results| Box::pin(async move { Ok(Value::from(results)) }));
            let sg = builder.aggregator(collect).build().unwrap();

            let out = sg
                .invoke(&Context::new(), Value::Null, &Opts::new())
                .await
                .unwrap();
            let got: Vec<i64> = out.as_array().unwrap().iter().map(|v| v.as_i64().unwrap()).collect();
            let expected: Vec<i64> = (0..delays_ms.len() as i64).collect();
            prop_assert_eq!(got, expected);
            Ok(())
        });
        result?;
    }

    /// Property 9: for any middleware stack [m0, m1, ..., mN], invocation
    /// order is m0-before, m1-before, ..., base, ..., m1-after, m0-after —
    /// outside-in regardless of how many layers are stacked.
    #[test]
    fn middleware_order_is_outside_in_for_any_stack_depth(depth in 1usize..8) {
        let rt = runtime();
        let result: Result<(), TestCaseError> = rt.block_on(async move {
            let log = Arc::new(Mutex::new(Vec::new()));
            let base_log = log.clone();
            let base = from_fn(move |_ctx, input, _opts| {
                let base_log = base_log.clone();
                Box::pin(async move {
                    base_log.lock().unwrap().push("base".to_string());
                    Ok(input)
                })
            });

            let middlewares: Vec<Middleware> =
                (0..depth).map(|i| labelled_middleware(i, log.clone())).collect();
            let composed = apply_middleware(base, &middlewares);

            composed
                .invoke(&Context::new(), Value::from("x"), &Opts::new())
                .await
                .unwrap();

            let recorded = log.lock().unwrap().clone();
            let mut expected: Vec<String> = (0..depth).map(|i| format!("{i}-before")).collect();
            expected.push("base".to_string());
            expected.extend((0..depth).rev().map(|i| format!("{i}-after")));
            prop_assert_eq!(recorded, expected);
            Ok(())
        });
        result?;
    }

    /// Property 2: for a Chain of any length, collecting Stream's single
    /// final item equals Invoke's return value.
    #[test]
    fn invoke_stream_consistency_for_any_chain_length(step_count in 0usize..10) {
        let rt = runtime();
        let result: Result<(), TestCaseError> = rt.block_on(async move {
            let mut builder = Chain::builder();
            for _ in 0..step_count {
                builder = builder.then(from_fn(|_ctx, input, _opts| {
                    Box::pin(async move {
                        let s = input.as_str().unwrap_or_default();
                        Ok(Value::from(format!("{s}.")))
                    })
                }));
            }
            let chain = builder.build();

            let invoked = chain
                .invoke(&Context::new(), Value::from("x"), &Opts::new())
                .await
                .unwrap();

            use futures::StreamExt;
            let mut s = chain
                .stream(&Context::new(), Value::from("x"), &Opts::new())
                .await
                .unwrap();
            let streamed = s.next().await.unwrap().unwrap();
            prop_assert!(s.next().await.is_none());
            prop_assert_eq!(invoked, streamed);
            Ok(())
        });
        result?;
    }

    /// Property 4: cancelling the context before Invoke stops every
    /// pattern without running any worker's side effect, for any worker
    /// count.
    #[test]
    fn cancellation_before_invoke_stops_all_workers(worker_count in 1usize..10) {
        let rt = runtime();
        let result: Result<(), TestCaseError> = rt.block_on(async move {
            let ran = Arc::new(AtomicUsize::new(0));
            let mut builder = ScatterGather::builder();
            for _ in 0..worker_count {
                let ran = ran.clone();
                builder = builder.worker(from_fn(move |_ctx, input, _opts| {
                    let ran = ran.clone();
                    Box::pin(async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(input)
                    })
                }));
            }
            let collect: compose_core::Aggregator =
                Arc::new(|_ctx, results| Box::pin(async move { Ok(Value::from(results)) }));
            let sg = builder.aggregator(collect).build().unwrap();

            let ctx = Context::new();
            ctx.cancel();

            let chain = Chain::builder().then(Arc::new(sg)).build();
            let err = chain
                .invoke(&ctx, Value::Null, &Opts::new())
                .await
                .unwrap_err();
            prop_assert!(err.is_cancelled() || matches!(err, compose_core::ComposeError::ChainStep { .. }));
            prop_assert_eq!(ran.load(Ordering::SeqCst), 0);
            Ok(())
        });
        result?;
    }
}
