//! Blackboard: shared-board multi-round agent collaboration with a
//! termination predicate.

use crate::agent::{stringify, Agent};
use crate::error::{ComposeError, Result};
use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use async_stream::stream;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::Instrument;

/// The reserved key under which the initial input is stored.
pub const INPUT_KEY: &str = "input";

/// The default round limit when not overridden.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// An immutable, deep copy of the board taken at a point in time. A
/// `BTreeMap` backing keeps key order deterministic when the snapshot is
/// stringified for agent consumption.
#[derive(Clone, Debug, Default)]
pub struct BoardSnapshot(BTreeMap<String, Value>);

impl BoardSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Renders the snapshot as a single JSON object value — what gets
    /// stringified and handed to each agent, and what's returned to the
    /// caller at the end of Invoke/Stream.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// A pure predicate over a board snapshot deciding whether collaboration
/// should stop. Consulted at the top of every round, before that round's
/// agents run.
pub type Termination = Arc<dyn Fn(&BoardSnapshot) -> bool + Send + Sync>;

/// Shared-state multi-round collaboration among agents.
pub struct Blackboard {
    agents: Vec<Agent>,
    termination: Termination,
    max_rounds: usize,
}

impl Blackboard {
    pub fn builder() -> BlackboardBuilder {
        BlackboardBuilder::default()
    }
}

pub struct BlackboardBuilder {
    agents: Vec<Agent>,
    termination: Option<Termination>,
    max_rounds: usize,
}

impl Default for BlackboardBuilder {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            termination: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl BlackboardBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Overrides the default round limit (10). Non-positive values are
    /// ignored, leaving the previous value in place.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        if max_rounds > 0 {
            self.max_rounds = max_rounds;
        }
        self
    }

    pub fn build(self) -> Result<Blackboard> {
        let termination = self
            .termination
            .ok_or_else(|| ComposeError::validation("blackboard has no termination predicate"))?;
        Ok(Blackboard {
            agents: self.agents,
            termination,
            max_rounds: self.max_rounds,
        })
    }
}

impl Blackboard {
    fn check_agents(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(ComposeError::invalid_call("blackboard requires at least one agent"));
        }
        Ok(())
    }

    async fn snapshot(board: &RwLock<BTreeMap<String, Value>>) -> BoardSnapshot {
        BoardSnapshot(board.read().await.clone())
    }
}

#[async_trait::async_trait]
impl Runnable for Blackboard {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span = tracing::debug_span!("blackboard.invoke", trace_id = %ctx.trace_id(), max_rounds = self.max_rounds);
        async move {
            self.check_agents()?;
            let board = RwLock::new(BTreeMap::new());
            board.write().await.insert(INPUT_KEY.to_string(), input);

            for round in 1..=self.max_rounds {
                if ctx.is_cancelled() {
                    tracing::warn!(round, "blackboard cancelled");
                    return Err(ComposeError::cancelled());
                }
                let snap = Self::snapshot(&board).await;
                if (self.termination)(&snap) {
                    tracing::debug!(round, "blackboard termination predicate satisfied");
                    return Ok(snap.to_value());
                }

                let stringified = stringify(&snap.to_value());
                for agent in &self.agents {
                    if ctx.is_cancelled() {
                        tracing::warn!(round, "blackboard cancelled");
                        return Err(ComposeError::cancelled());
                    }
                    tracing::debug!(round, agent = agent.id(), "blackboard agent starting");
                    let result = agent
                        .invoke(ctx, Value::from(stringified.clone()), opts)
                        .await
                        .map_err(|e| {
                            tracing::error!(round, agent = agent.id(), error = %e, "blackboard agent failed");
                            ComposeError::blackboard_agent(agent.id(), round, e)
                        })?;
                    board.write().await.insert(agent.id().to_string(), result);
                }
            }

            tracing::debug!("blackboard exhausted max rounds");
            Ok(Self::snapshot(&board).await.to_value())
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("blackboard.stream", trace_id = %ctx.trace_id(), max_rounds = self.max_rounds);
        async move {
            self.check_agents()?;

            let ctx = ctx.clone();
            let opts = opts.clone();
            let agents = self.agents.clone();
            let termination = self.termination.clone();
            let max_rounds = self.max_rounds;

            let s = stream! {
                let board = RwLock::new(BTreeMap::new());
                board.write().await.insert(INPUT_KEY.to_string(), input);

                for round in 1..=max_rounds {
                    if ctx.is_cancelled() {
                        tracing::warn!(round, "blackboard cancelled");
                        yield Err(ComposeError::cancelled());
                        return;
                    }
                    let snap = Blackboard::snapshot(&board).await;
                    if termination(&snap) {
                        tracing::debug!(round, "blackboard termination predicate satisfied");
                        yield Ok(snap.to_value());
                        return;
                    }

                    let stringified = stringify(&snap.to_value());
                    let mut round_failed = false;
                    for agent in &agents {
                        if ctx.is_cancelled() {
                            tracing::warn!(round, "blackboard cancelled");
                            yield Err(ComposeError::cancelled());
                            return;
                        }
                        tracing::debug!(round, agent = agent.id(), "blackboard agent starting");
                        let result = agent
                            .invoke(&ctx, Value::from(stringified.clone()), &opts)
                            .await
                            .map_err(|e| {
                                tracing::error!(round, agent = agent.id(), error = %e, "blackboard agent failed");
                                ComposeError::blackboard_agent(agent.id(), round, e)
                            });
                        match result {
                            Ok(value) => {
                                board.write().await.insert(agent.id().to_string(), value);
                            }
                            Err(e) => {
                                yield Err(e);
                                round_failed = true;
                                break;
                            }
                        }
                    }
                    if round_failed {
                        return;
                    }

                    yield Ok(Blackboard::snapshot(&board).await.to_value());
                }
            };
            Ok(Box::pin(s))
        }
        .instrument(span)
        .await
    }
}
