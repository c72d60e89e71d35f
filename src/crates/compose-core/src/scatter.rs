//! Scatter/Gather: concurrent fan-out with ordered aggregation.

use crate::error::{ComposeError, Result};
use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Combines the ordered, per-worker results into a single value. Receives
/// the results in worker-declaration order regardless of completion order.
pub type Aggregator =
    Arc<dyn Fn(Context, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Fans `input` out to every worker concurrently, then combines their
/// ordered results with `aggregator`.
pub struct ScatterGather {
    workers: Vec<Arc<dyn Runnable>>,
    aggregator: Aggregator,
    timeout: Option<Duration>,
}

impl ScatterGather {
    pub fn builder() -> ScatterGatherBuilder {
        ScatterGatherBuilder::default()
    }
}

#[derive(Default)]
pub struct ScatterGatherBuilder {
    workers: Vec<Arc<dyn Runnable>>,
    aggregator: Option<Aggregator>,
    timeout: Option<Duration>,
}

impl ScatterGatherBuilder {
    pub fn worker(mut self, runnable: Arc<dyn Runnable>) -> Self {
        self.workers.push(runnable);
        self
    }

    pub fn workers(mut self, runnables: impl IntoIterator<Item = Arc<dyn Runnable>>) -> Self {
        self.workers.extend(runnables);
        self
    }

    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// A timeout > 0 derives a cancellation deadline shared by every
    /// worker.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ScatterGather> {
        let aggregator = self
            .aggregator
            .ok_or_else(|| ComposeError::validation("scatter/gather has no aggregator"))?;
        Ok(ScatterGather {
            workers: self.workers,
            aggregator,
            timeout: self.timeout,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for ScatterGather {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span =
            tracing::debug_span!("scatter.invoke", trace_id = %ctx.trace_id(), workers = self.workers.len());
        async move {
            let worker_ctx = match self.timeout {
                Some(dur) => ctx.with_timeout(dur),
                None => ctx.child(),
            };

            if self.workers.is_empty() {
                tracing::debug!("scatter has no workers, calling aggregator with empty slice");
                return (self.aggregator)(ctx.clone(), Vec::new())
                    .await
                    .map_err(ComposeError::scatter_aggregate);
            }

            let mut handles = Vec::with_capacity(self.workers.len());
            for worker in &self.workers {
                let worker = worker.clone();
                let worker_ctx = worker_ctx.clone();
                let input = input.clone();
                let opts = opts.clone();
                handles.push(tokio::spawn(async move {
                    worker.invoke(&worker_ctx, input, &opts).await
                }));
            }

            // Wait for every handle before returning, even after the first
            // error: cancel `worker_ctx` as soon as a worker fails so the
            // remaining in-flight workers observe cancellation and stop
            // promptly instead of being orphaned with their results discarded.
            let mut results: Vec<Option<Value>> = vec![None; handles.len()];
            let mut first_error: Option<ComposeError> = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Ok(value)) => {
                        results[index] = Some(value);
                    }
                    Ok(Err(err)) => {
                        tracing::error!(worker = index, error = %err, "scatter worker failed");
                        if first_error.is_none() {
                            worker_ctx.cancel();
                            first_error = Some(ComposeError::scatter_worker(index, err));
                        }
                    }
                    Err(join_err) => {
                        tracing::error!(worker = index, error = %join_err, "scatter worker panicked");
                        if first_error.is_none() {
                            worker_ctx.cancel();
                            first_error = Some(ComposeError::ScatterWorkerPanicked {
                                index,
                                message: join_err.to_string(),
                            });
                        }
                    }
                }
            }

            if let Some(err) = first_error {
                return Err(err);
            }

            let results: Vec<Value> = results
                .into_iter()
                .map(|v| v.expect("every worker index populated on the success path"))
                .collect();

            tracing::debug!("scatter all workers succeeded, aggregating");
            (self.aggregator)(ctx.clone(), results)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "scatter aggregator failed");
                    ComposeError::scatter_aggregate(e)
                })
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("scatter.stream", trace_id = %ctx.trace_id());
        let result = async move { self.invoke(ctx, input, opts).await }
            .instrument(span)
            .await;
        Ok(crate::runnable::stream_once(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runnable::from_fn;

    fn echo_indexed(n: i64) -> Arc<dyn Runnable> {
        from_fn(move |_ctx, _input, _opts| Box::pin(async move { Ok(Value::from(n)) }))
    }

    fn sum_aggregator() -> Aggregator {
        Arc::new(|_ctx, results: Vec<Value>| {
            Box::pin(async move {
                let sum: i64 = results.iter().filter_map(|v| v.as_i64()).sum();
                Ok(Value::from(sum))
            })
        })
    }

    // S4: three workers producing 1, 2, 3 sum to 6, preserving declared order.
    #[tokio::test]
    async fn seed_scenario_s4_ordered_aggregation() {
        let sg = ScatterGather::builder()
            .worker(echo_indexed(1))
            .worker(echo_indexed(2))
            .worker(echo_indexed(3))
            .aggregator(sum_aggregator())
            .build()
            .unwrap();

        let out = sg
            .invoke(&Context::new(), Value::Null, &Opts::new())
            .await
            .unwrap();
        assert_eq!(out, Value::from(6));
    }

    #[tokio::test]
    async fn empty_workers_calls_aggregator_with_empty_slice() {
        let sg = ScatterGather::builder().aggregator(sum_aggregator()).build().unwrap();
        let out = sg
            .invoke(&Context::new(), Value::Null, &Opts::new())
            .await
            .unwrap();
        assert_eq!(out, Value::from(0));
    }

    #[tokio::test]
    async fn first_erroring_worker_by_index_wins_and_discards_others() {
        let failing_first = from_fn(|_ctx, _input, _opts| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(ComposeError::execution("first"))
            })
        });
        let failing_second = from_fn(|_ctx, _input, _opts| {
            Box::pin(async move { Err(ComposeError::execution("second")) })
        });

        let sg = ScatterGather::builder()
            .worker(failing_first)
            .worker(failing_second)
            .aggregator(sum_aggregator())
            .build()
            .unwrap();

        let err = sg
            .invoke(&Context::new(), Value::Null, &Opts::new())
            .await
            .unwrap_err();
        match err {
            ComposeError::ScatterWorker { index, .. } => assert_eq!(index, 0),
            other => panic!("expected ScatterWorker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ordering_preserved_regardless_of_completion_order() {
        let slow = from_fn(|_ctx, _input, _opts| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Value::from("slow"))
            })
        });
        let fast = from_fn(|_ctx, _input, _opts| Box::pin(async move { Ok(Value::from("fast")) }));

        let collect_aggregator: Aggregator =
            Arc::new(|_ctx, results| Box::pin(async move { Ok(Value::from(results)) }));

        let sg = ScatterGather::builder()
            .worker(slow)
            .worker(fast)
            .aggregator(collect_aggregator)
            .build()
            .unwrap();

        let out = sg
            .invoke(&Context::new(), Value::Null, &Opts::new())
            .await
            .unwrap();
        assert_eq!(out, Value::from(vec!["slow", "fast"]));
    }
}
