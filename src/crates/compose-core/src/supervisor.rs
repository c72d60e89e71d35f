//! Supervisor: iterative agent delegation via a pluggable selection
//! strategy.

use crate::agent::{stringify, Agent};
use crate::error::{ComposeError, Result};
use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use async_stream::stream;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::sync::Arc;
use tracing::Instrument;

/// Selects the next agent to run given the current value and the full
/// roster. Returning `Ok(None)` is the early termination signal.
pub type Strategy =
    Arc<dyn Fn(Context, Value, Arc<[Agent]>) -> BoxFuture<'static, Result<Option<Agent>>> + Send + Sync>;

/// Iteratively delegates `current` to agents chosen by `strategy`, up to
/// `max_rounds` times.
pub struct Supervisor {
    agents: Arc<[Agent]>,
    strategy: Strategy,
    max_rounds: usize,
}

impl Supervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::default()
    }
}

#[derive(Default)]
pub struct SupervisorBuilder {
    agents: Vec<Agent>,
    strategy: Option<Strategy>,
    max_rounds: Option<usize>,
}

impl SupervisorBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn build(self) -> Result<Supervisor> {
        let strategy = self
            .strategy
            .ok_or_else(|| ComposeError::validation("supervisor has no selection strategy"))?;
        let max_rounds = self.max_rounds.unwrap_or(0);
        if max_rounds == 0 {
            return Err(ComposeError::validation("supervisor max_rounds must be positive"));
        }
        Ok(Supervisor {
            agents: self.agents.into(),
            strategy,
            max_rounds,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for Supervisor {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span = tracing::debug_span!("supervisor.invoke", trace_id = %ctx.trace_id(), max_rounds = self.max_rounds);
        async move {
            let mut current = input;

            for round in 0..self.max_rounds {
                if ctx.is_cancelled() {
                    tracing::warn!(round, "supervisor cancelled");
                    return Err(ComposeError::cancelled());
                }
                let selected = (self.strategy)(ctx.clone(), current.clone(), self.agents.clone())
                    .await
                    .map_err(|e| {
                        tracing::error!(round, error = %e, "supervisor strategy failed");
                        ComposeError::supervisor_strategy(e)
                    })?;

                let Some(agent) = selected else {
                    tracing::debug!(round, "supervisor strategy declined, terminating early");
                    return Ok(current);
                };

                tracing::debug!(round, agent = agent.id(), "supervisor delegating to agent");
                let result = agent
                    .invoke(ctx, Value::from(stringify(&current)), opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(round, agent = agent.id(), error = %e, "supervisor agent failed");
                        ComposeError::supervisor_agent(agent.id(), e)
                    })?;
                current = result;
            }

            tracing::debug!("supervisor exhausted max rounds");
            Ok(current)
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("supervisor.stream", trace_id = %ctx.trace_id(), max_rounds = self.max_rounds);
        async move {
            if self.max_rounds == 0 {
                return Ok(Box::pin(futures::stream::once(async move { Ok(input) })));
            }

            let mut current = input;

            // Rounds 1..max_rounds-1 are invoked synchronously; only the final
            // round streams.
            for round in 0..self.max_rounds.saturating_sub(1) {
                if ctx.is_cancelled() {
                    tracing::warn!(round, "supervisor cancelled");
                    return Err(ComposeError::cancelled());
                }
                let selected = (self.strategy)(ctx.clone(), current.clone(), self.agents.clone())
                    .await
                    .map_err(|e| {
                        tracing::error!(round, error = %e, "supervisor strategy failed");
                        ComposeError::supervisor_strategy(e)
                    })?;

                let Some(agent) = selected else {
                    // Early termination before the final round: nothing left
                    // to stream, yield the current value as the terminal item.
                    tracing::debug!(round, "supervisor strategy declined before final round");
                    return Ok(Box::pin(futures::stream::once(async move { Ok(current) })));
                };

                tracing::debug!(round, agent = agent.id(), "supervisor delegating to agent");
                let result = agent
                    .invoke(ctx, Value::from(stringify(&current)), opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(round, agent = agent.id(), error = %e, "supervisor agent failed");
                        ComposeError::supervisor_agent(agent.id(), e)
                    })?;
                current = result;
            }

            tracing::debug!("supervisor streaming final round");
            let ctx = ctx.clone();
            let opts = opts.clone();
            let agents = self.agents.clone();
            let strategy = self.strategy.clone();

            let s = stream! {
                let selected = match strategy(ctx.clone(), current.clone(), agents).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(error = %e, "supervisor strategy failed on final round");
                        yield Err(ComposeError::supervisor_strategy(e));
                        return;
                    }
                };

                match selected {
                    None => yield Ok(current),
                    Some(agent) => {
                        let agent_id = agent.id().to_string();
                        let inner = agent
                            .stream(&ctx, Value::from(stringify(&current)), &opts)
                            .await
                            .map_err(|e| ComposeError::supervisor_agent(agent_id.clone(), e));
                        match inner {
                            Ok(mut inner) => {
                                while let Some(item) = inner.next().await {
                                    yield item.map_err(|e| ComposeError::supervisor_agent(agent_id.clone(), e));
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
            };
            Ok(Box::pin(s))
        }
        .instrument(span)
        .await
    }
}
