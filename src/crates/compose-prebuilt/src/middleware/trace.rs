//! Trace middleware: structured `tracing` events around any wrapped
//! Runnable's `invoke`, following the `tracing::debug!`/`info!`/`warn!`/
//! `error!` instrumentation idiom `langgraph-core` uses throughout its
//! Pregel executor, applied here to an arbitrary Runnable rather than a
//! fixed node type.

use compose_core::runnable::{from_fn, Context, Opts, Value};
use compose_core::{Middleware, Runnable};
use std::time::Instant;

/// Builds a [`Middleware`] that logs `label` before and after each
/// `invoke`, including elapsed time and whether it succeeded.
pub fn trace(label: impl Into<String>) -> Middleware {
    let label: std::sync::Arc<str> = label.into().into();
    std::sync::Arc::new(move |inner| {
        let label = label.clone();
        from_fn(move |ctx: Context, input: Value, opts: Opts| {
            let inner = inner.clone();
            let label = label.clone();
            Box::pin(async move {
                let trace_id = ctx.trace_id();
                tracing::debug!(runnable = %label, %trace_id, "invoke starting");
                let start = Instant::now();
                let result = inner.invoke(&ctx, input, &opts).await;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                match &result {
                    Ok(_) => tracing::info!(runnable = %label, %trace_id, elapsed_ms, "invoke succeeded"),
                    Err(e) => tracing::warn!(runnable = %label, %trace_id, elapsed_ms, error = %e, "invoke failed"),
                }
                result
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_core::runnable::from_fn as leaf_from_fn;

    #[tokio::test]
    async fn trace_forwards_success_unchanged() {
        let base = leaf_from_fn(|_ctx, input, _opts| Box::pin(async move { Ok(input) }));
        let wrapped = trace("unit-test")(base);
        let out = wrapped
            .invoke(&Context::new(), Value::from("x"), &Opts::new())
            .await
            .unwrap();
        assert_eq!(out, Value::from("x"));
    }

    #[tokio::test]
    async fn trace_forwards_errors_unchanged() {
        use compose_core::ComposeError;
        let base = leaf_from_fn(|_ctx, _input, _opts| {
            Box::pin(async move { Err(ComposeError::execution("boom")) })
        });
        let wrapped = trace("unit-test")(base);
        let err = wrapped
            .invoke(&Context::new(), Value::Null, &Opts::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Execution(_)));
    }
}
