//! Error types shared by every composition pattern.
//!
//! `ComposeError` groups construction errors, validation errors,
//! propagation (wrapped causes with a location prefix), cancellation,
//! bound-exceeded, and timeout. Every pattern wraps a failing
//! sub-coordinate's error using a location-naming convention ("Chain
//! step 2", "Graph node X", "Scatter worker 3", "Supervisor agent Y",
//! "Blackboard agent Z round N") rather than swallowing it — the original
//! error is always preserved as a `#[source]`.

use thiserror::Error;

/// Convenience result type used throughout `compose-core`.
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Errors produced by the orchestration core.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// Invalid topology discovered at construction time (duplicate node,
    /// unknown edge endpoint, empty name, missing entry, non-positive
    /// configuration).
    #[error("construction failed: {0}")]
    Validation(String),

    /// A caller-time invariant was violated (unknown route with no
    /// fallback, empty worker/agent set where one is required).
    #[error("{0}")]
    InvalidCall(String),

    /// A Chain step failed; `index` is the 0-based position of the step.
    #[error("Chain step {index} failed: {source}")]
    ChainStep {
        index: usize,
        #[source]
        source: Box<ComposeError>,
    },

    /// A Graph node failed while being invoked or streamed.
    #[error("Graph node '{node}' failed: {source}")]
    GraphNode {
        node: String,
        #[source]
        source: Box<ComposeError>,
    },

    /// Graph traversal exceeded its configured depth bound without
    /// reaching a terminal node.
    #[error("Graph exceeded max traversal depth ({limit})")]
    GraphDepthExceeded { limit: usize },

    /// The Router's classifier itself failed.
    #[error("Router classifier failed: {source}")]
    RouterClassifier {
        #[source]
        source: Box<ComposeError>,
    },

    /// The classifier returned a route name with no matching entry and no
    /// fallback was registered.
    #[error("Router: unknown route '{route}' and no fallback registered")]
    UnknownRoute { route: String },

    /// A Scatter/Gather worker failed; `index` matches its position in the
    /// declared worker list.
    #[error("Scatter worker {index} failed: {source}")]
    ScatterWorker {
        index: usize,
        #[source]
        source: Box<ComposeError>,
    },

    /// The Scatter/Gather aggregator itself failed.
    #[error("Scatter aggregator failed: {source}")]
    ScatterAggregate {
        #[source]
        source: Box<ComposeError>,
    },

    /// A worker task panicked instead of returning a value.
    #[error("Scatter worker {index} panicked: {message}")]
    ScatterWorkerPanicked { index: usize, message: String },

    /// A Supervisor's selection strategy failed.
    #[error("Supervisor strategy failed: {source}")]
    SupervisorStrategy {
        #[source]
        source: Box<ComposeError>,
    },

    /// A Supervisor-selected agent failed.
    #[error("Supervisor agent '{agent}' failed: {source}")]
    SupervisorAgent {
        agent: String,
        #[source]
        source: Box<ComposeError>,
    },

    /// A Blackboard agent failed during a given round.
    #[error("Blackboard agent '{agent}' failed in round {round}: {source}")]
    BlackboardAgent {
        agent: String,
        round: usize,
        #[source]
        source: Box<ComposeError>,
    },

    /// A round-bounded pattern (Supervisor, Blackboard) exceeded its
    /// configured round limit without the relevant loop terminating.
    #[error("{pattern} exceeded max rounds ({limit})")]
    RoundsExceeded { pattern: &'static str, limit: usize },

    /// Cancellation observed before or during an operation. Treated as an
    /// expected terminal condition, not a bug.
    #[error("operation cancelled")]
    Cancelled,

    /// Scatter/Gather's configured timeout elapsed before all workers
    /// finished.
    #[error("operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// Generic execution error without a more specific variant.
    #[error("execution failed: {0}")]
    Execution(String),

    /// JSON (de)serialization failure, surfaced transparently.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Escape hatch for application-defined errors raised by leaf
    /// Runnables (model calls, tools, agents) that don't fit any of the
    /// above.
    #[error("{0}")]
    Custom(String),
}

impl ComposeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_call(msg: impl Into<String>) -> Self {
        Self::InvalidCall(msg.into())
    }

    pub fn chain_step(index: usize, source: ComposeError) -> Self {
        Self::ChainStep {
            index,
            source: Box::new(source),
        }
    }

    pub fn graph_node(node: impl Into<String>, source: ComposeError) -> Self {
        Self::GraphNode {
            node: node.into(),
            source: Box::new(source),
        }
    }

    pub fn router_classifier(source: ComposeError) -> Self {
        Self::RouterClassifier {
            source: Box::new(source),
        }
    }

    pub fn unknown_route(route: impl Into<String>) -> Self {
        Self::UnknownRoute {
            route: route.into(),
        }
    }

    pub fn scatter_worker(index: usize, source: ComposeError) -> Self {
        Self::ScatterWorker {
            index,
            source: Box::new(source),
        }
    }

    pub fn scatter_aggregate(source: ComposeError) -> Self {
        Self::ScatterAggregate {
            source: Box::new(source),
        }
    }

    pub fn supervisor_strategy(source: ComposeError) -> Self {
        Self::SupervisorStrategy {
            source: Box::new(source),
        }
    }

    pub fn supervisor_agent(agent: impl Into<String>, source: ComposeError) -> Self {
        Self::SupervisorAgent {
            agent: agent.into(),
            source: Box::new(source),
        }
    }

    pub fn blackboard_agent(agent: impl Into<String>, round: usize, source: ComposeError) -> Self {
        Self::BlackboardAgent {
            agent: agent.into(),
            round,
            source: Box::new(source),
        }
    }

    pub fn rounds_exceeded(pattern: &'static str, limit: usize) -> Self {
        Self::RoundsExceeded { pattern, limit }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// True for errors that represent cooperative cancellation rather than
    /// an application failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
