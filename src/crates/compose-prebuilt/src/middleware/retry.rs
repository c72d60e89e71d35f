//! Retry middleware: wraps any [`Runnable`] with exponential backoff and
//! jitter, ported from `langgraph-core`'s `RetryPolicy` /
//! `pregel::executor::TaskExecutor` (a graph-node retry policy) to a
//! generic `compose_core::Middleware`.

use compose_core::runnable::{from_fn, Context, Opts, Value};
use compose_core::{ComposeError, Middleware, Runnable};
use rand::Rng;
use std::time::Duration;

/// Configuration for retrying a wrapped Runnable's `invoke` calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_interval: Duration,
    pub backoff_factor: f64,
    pub max_interval: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(128),
            jitter: true,
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay(&self, attempt: usize) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval.as_secs_f64());
        let final_secs = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * jitter_factor
        } else {
            capped
        };
        Duration::from_secs_f64(final_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Builds a [`Middleware`] that retries the wrapped Runnable's `invoke`
/// according to `policy`. Cancellation is observed between attempts so a
/// cancelled context aborts the retry loop immediately instead of sleeping
/// through the backoff delay.
pub fn retry(policy: RetryPolicy) -> Middleware {
    std::sync::Arc::new(move |inner| {
        let policy = policy.clone();
        from_fn(move |ctx: Context, input: Value, opts: Opts| {
            let inner = inner.clone();
            let policy = policy.clone();
            Box::pin(async move {
                let mut attempt = 0usize;
                let mut last_error: Option<ComposeError> = None;

                while attempt < policy.max_attempts {
                    if ctx.is_cancelled() {
                        return Err(ComposeError::cancelled());
                    }
                    attempt += 1;
                    match inner.invoke(&ctx, input.clone(), &opts).await {
                        Ok(value) => {
                            if attempt > 1 {
                                tracing::info!(attempts = attempt, "retry middleware: succeeded after retry");
                            }
                            return Ok(value);
                        }
                        Err(e) => {
                            if attempt < policy.max_attempts {
                                let delay = policy.delay(attempt);
                                tracing::warn!(
                                    attempt,
                                    max_attempts = policy.max_attempts,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %e,
                                    "retry middleware: attempt failed, retrying after delay"
                                );
                                tokio::time::sleep(delay).await;
                            } else {
                                tracing::error!(attempts = attempt, error = %e, "retry middleware: attempts exhausted");
                            }
                            last_error = Some(e);
                        }
                    }
                }

                Err(last_error.unwrap_or_else(|| ComposeError::execution("retry middleware: no attempts made")))
            })
        })
    })
}
