//! Chain: a sequential pipeline where the output of step N feeds step N+1.

use crate::error::{ComposeError, Result};
use crate::runnable::{identity, Context, Opts, Runnable, RunnableStream, Value};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::Instrument;

/// An ordered sequence of steps. An empty Chain is the identity Runnable.
pub struct Chain {
    steps: Vec<Arc<dyn Runnable>>,
}

impl Chain {
    pub fn new(steps: Vec<Arc<dyn Runnable>>) -> Self {
        Self { steps }
    }

    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }
}

#[derive(Default)]
pub struct ChainBuilder {
    steps: Vec<Arc<dyn Runnable>>,
}

impl ChainBuilder {
    pub fn then(mut self, step: Arc<dyn Runnable>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Chain {
        Chain::new(self.steps)
    }
}

#[async_trait]
impl Runnable for Chain {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span = tracing::debug_span!("chain.invoke", trace_id = %ctx.trace_id(), steps = self.steps.len());
        async move {
            if self.steps.is_empty() {
                return identity().invoke(ctx, input, opts).await;
            }
            let mut value = input;
            for (index, step) in self.steps.iter().enumerate() {
                if ctx.is_cancelled() {
                    tracing::warn!(step = index, "chain cancelled");
                    return Err(ComposeError::cancelled());
                }
                tracing::debug!(step = index, "chain step starting");
                value = step
                    .invoke(ctx, value, opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(step = index, error = %e, "chain step failed");
                        ComposeError::chain_step(index, e)
                    })?;
            }
            tracing::debug!("chain invoke completed");
            Ok(value)
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("chain.stream", trace_id = %ctx.trace_id(), steps = self.steps.len());
        async move {
            if self.steps.is_empty() {
                return identity().stream(ctx, input, opts).await;
            }
            let (last, head) = self.steps.split_last().expect("checked non-empty above");

            let mut value = input;
            for (index, step) in head.iter().enumerate() {
                if ctx.is_cancelled() {
                    tracing::warn!(step = index, "chain cancelled");
                    return Err(ComposeError::cancelled());
                }
                tracing::debug!(step = index, "chain step starting");
                value = step
                    .invoke(ctx, value, opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(step = index, error = %e, "chain step failed");
                        ComposeError::chain_step(index, e)
                    })?;
            }

            let last_index = self.steps.len() - 1;
            tracing::debug!(step = last_index, "chain streaming final step");
            let inner = last
                .stream(ctx, value, opts)
                .await
                .map_err(|e| ComposeError::chain_step(last_index, e))?;
            let wrapped = inner.map(move |item| item.map_err(|e| ComposeError::chain_step(last_index, e)));
            Ok(Box::pin(wrapped))
        }
        .instrument(span)
        .await
    }
}
