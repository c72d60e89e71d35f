//! Middleware: a unary function transforming one [`Runnable`] into another.
//!
//! Application order is outside-in — `apply(base, [m1, m2, m3])` produces
//! `m1(m2(m3(base)))`, so `m1` is the outermost wrapper and sees calls
//! first. This lets retry wrap caching wrap rate-limiting in the intuitive
//! narrative order a caller would name them in.

use crate::runnable::Runnable;
use std::sync::Arc;

/// A transformer from one Runnable to another. Middleware may delegate,
/// transform input, inspect or replace results, or short-circuit entirely
/// without calling the wrapped Runnable.
pub type Middleware = Arc<dyn Fn(Arc<dyn Runnable>) -> Arc<dyn Runnable> + Send + Sync>;

/// Apply a list of middleware to `base`, outside-in.
///
/// Given `[m1, m2, m3]`, the effective structure is `m1(m2(m3(base)))`:
/// folding from the right wraps `base` with `m3` first, then `m2`, then
/// `m1`, leaving `m1` as the outermost (first-to-see-the-call) layer.
pub fn apply(base: Arc<dyn Runnable>, middlewares: &[Middleware]) -> Arc<dyn Runnable> {
    middlewares
        .iter()
        .rev()
        .fold(base, |acc, middleware| middleware(acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runnable::{from_fn, Context, Opts, Value};
    use std::sync::Mutex;

    fn recording_middleware(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
        Arc::new(move |inner| {
            let log = log.clone();
            from_fn(move |ctx, input, opts| {
                let log = log.clone();
                let inner = inner.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(format!("{name}-before"));
                    let result = inner.invoke(&ctx, input, &opts).await;
                    log.lock().unwrap().push(format!("{name}-after"));
                    result
                })
            })
        })
    }

    #[tokio::test]
    async fn order_is_outside_in_m1_m2_m3_base() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let base_log = log.clone();
        let base = from_fn(move |_ctx, input, _opts| {
            let base_log = base_log.clone();
            Box::pin(async move {
                base_log.lock().unwrap().push("base".to_string());
                Ok(input)
            })
        });

        let middlewares = vec![
            recording_middleware("m1", log.clone()),
            recording_middleware("m2", log.clone()),
            recording_middleware("m3", log.clone()),
        ];

        let composed = apply(base, &middlewares);
        composed
            .invoke(&Context::new(), Value::from("x"), &Opts::new())
            .await
            .unwrap();

        let recorded = log.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                "m1-before", "m2-before", "m3-before", "base", "m3-after", "m2-after", "m1-after",
            ]
        );
    }
}
