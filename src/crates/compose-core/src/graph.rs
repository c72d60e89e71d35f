//! Graph: directed traversal over named nodes with conditional edges.

use crate::error::{ComposeError, Result};
use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use async_stream::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// The maximum number of node invocations a single traversal may perform
/// before it is considered cyclic and aborted.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// A pure predicate deciding whether an edge should be taken, given the
/// result produced by the edge's source node. Must not mutate state or have
/// side effects.
pub type EdgeCondition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

struct Edge {
    to: String,
    condition: Option<EdgeCondition>,
}

struct Node {
    runnable: Arc<dyn Runnable>,
    edges: Vec<Edge>,
}

/// A directed graph of named Runnables. Construction-time validation
/// rejects duplicate names, empty names, and edges referencing unknown
/// nodes.
pub struct Graph {
    entry: String,
    nodes: HashMap<String, Node>,
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// True iff `name` has zero outgoing edges declared at construction
    /// time. Used to distinguish a genuine leaf (streamed) from a
    /// fallthrough node whose edges all failed to match (yields its value
    /// but is not streamed).
    pub fn is_leaf(&self, name: &str) -> bool {
        self.nodes.get(name).map(|n| n.edges.is_empty()).unwrap_or(false)
    }

    fn node(&self, name: &str) -> Result<&Node> {
        self.nodes
            .get(name)
            .ok_or_else(|| ComposeError::validation(format!("unknown node '{name}'")))
    }

    /// Scans `node`'s outgoing edges in declaration order, returning the
    /// first whose condition matches `result` (or has none).
    fn select_next<'a>(&'a self, node: &'a Node, result: &Value) -> Option<&'a str> {
        node.edges
            .iter()
            .find(|edge| edge.condition.as_ref().map(|c| c(result)).unwrap_or(true))
            .map(|edge| edge.to.as_str())
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    entry: Option<String>,
    nodes: HashMap<String, Node>,
    order: Vec<String>,
}

impl GraphBuilder {
    pub fn node(mut self, name: impl Into<String>, runnable: Arc<dyn Runnable>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ComposeError::validation("node name must not be empty"));
        }
        if self.nodes.contains_key(&name) {
            return Err(ComposeError::validation(format!("duplicate node '{name}'")));
        }
        self.order.push(name.clone());
        self.nodes.insert(
            name,
            Node {
                runnable,
                edges: Vec::new(),
            },
        );
        Ok(self)
    }

    /// Add an unconditional or conditional edge from `from` to `to`. Edges
    /// from the same node are tried in the order they're added.
    pub fn edge(
        mut self,
        from: impl AsRef<str>,
        to: impl Into<String>,
        condition: Option<EdgeCondition>,
    ) -> Result<Self> {
        let to = to.into();
        if !self.nodes.contains_key(&to) {
            return Err(ComposeError::validation(format!("edge references unknown node '{to}'")));
        }
        let from = from.as_ref();
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| ComposeError::validation(format!("edge references unknown node '{from}'")))?;
        node.edges.push(Edge { to, condition });
        Ok(self)
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Graph> {
        let entry = self
            .entry
            .ok_or_else(|| ComposeError::validation("graph has no entry node"))?;
        if !self.nodes.contains_key(&entry) {
            return Err(ComposeError::validation(format!("entry '{entry}' is not a declared node")));
        }
        Ok(Graph {
            entry,
            nodes: self.nodes,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for Graph {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span = tracing::debug_span!("graph.invoke", trace_id = %ctx.trace_id(), entry = %self.entry);
        async move {
            let mut current = self.entry.clone();
            let mut value = input;

            for _ in 0..MAX_TRAVERSAL_DEPTH {
                if ctx.is_cancelled() {
                    tracing::warn!(node = %current, "graph cancelled");
                    return Err(ComposeError::cancelled());
                }
                let node = self.node(&current)?;
                tracing::debug!(node = %current, "graph node starting");
                let result = node
                    .runnable
                    .invoke(ctx, value.clone(), opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(node = %current, error = %e, "graph node failed");
                        ComposeError::graph_node(current.clone(), e)
                    })?;

                match self.select_next(node, &result) {
                    Some(next) => {
                        tracing::debug!(from = %current, to = %next, "graph edge taken");
                        current = next.to_string();
                        value = result;
                    }
                    // Decision (DESIGN.md #5): the terminal node's own result is
                    // returned, not the pre-invoke value.
                    None => {
                        tracing::debug!(node = %current, "graph traversal terminal");
                        return Ok(result);
                    }
                }
            }
            tracing::error!(limit = MAX_TRAVERSAL_DEPTH, "graph exceeded max traversal depth");
            Err(ComposeError::GraphDepthExceeded {
                limit: MAX_TRAVERSAL_DEPTH,
            })
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("graph.stream", trace_id = %ctx.trace_id(), entry = %self.entry);
        async move {
            let mut current = self.entry.clone();
            let mut value = input;
            let mut steps = 0usize;

            loop {
                if ctx.is_cancelled() {
                    tracing::warn!(node = %current, "graph cancelled");
                    return Err(ComposeError::cancelled());
                }
                if steps >= MAX_TRAVERSAL_DEPTH {
                    tracing::error!(limit = MAX_TRAVERSAL_DEPTH, "graph exceeded max traversal depth");
                    return Err(ComposeError::GraphDepthExceeded {
                        limit: MAX_TRAVERSAL_DEPTH,
                    });
                }
                steps += 1;

                let node = self.node(&current)?;
                let is_leaf = self.is_leaf(&current);

                if is_leaf {
                    tracing::debug!(node = %current, "graph streaming leaf node");
                    let ctx = ctx.clone();
                    let opts = opts.clone();
                    let runnable = node.runnable.clone();
                    let node_name = current.clone();
                    let s = stream! {
                        let inner = runnable
                            .stream(&ctx, value, &opts)
                            .await
                            .map_err(|e| ComposeError::graph_node(node_name.clone(), e));
                        match inner {
                            Ok(mut inner) => {
                                use futures::StreamExt;
                                while let Some(item) = inner.next().await {
                                    yield item.map_err(|e| ComposeError::graph_node(node_name.clone(), e));
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    };
                    return Ok(Box::pin(s));
                }

                tracing::debug!(node = %current, "graph node starting");
                let result = node
                    .runnable
                    .invoke(ctx, value.clone(), opts)
                    .await
                    .map_err(|e| {
                        tracing::error!(node = %current, error = %e, "graph node failed");
                        ComposeError::graph_node(current.clone(), e)
                    })?;

                match self.select_next(node, &result) {
                    Some(next) => {
                        tracing::debug!(from = %current, to = %next, "graph edge taken");
                        current = next.to_string();
                        value = result;
                    }
                    None => {
                        tracing::debug!(node = %current, "graph traversal terminal (fallthrough)");
                        return Ok(Box::pin(futures::stream::once(async move { Ok(result) })));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
