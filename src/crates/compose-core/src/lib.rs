//! `compose-core`: the orchestration core of the framework — a single
//! [`Runnable`] abstraction that every composition pattern (Chain, Graph,
//! Router, Scatter/Gather, Supervisor, Blackboard) and every leaf
//! computation (model call, tool, agent) implements, plus the
//! cross-cutting concerns (middleware, hooks, streaming, cancellation)
//! that apply uniformly across all of them.
//!
//! This crate runs in a single process address space: it does not attempt
//! distributed cross-process coordination or durable workflow persistence,
//! and it does not choose a topology on the caller's behalf — the caller
//! always picks the pattern explicitly.

pub mod agent;
pub mod blackboard;
pub mod chain;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod middleware;
pub mod router;
pub mod runnable;
pub mod scatter;
pub mod supervisor;

pub use agent::Agent;
pub use blackboard::{Blackboard, BlackboardBuilder, BoardSnapshot, Termination};
pub use chain::{Chain, ChainBuilder};
pub use error::{ComposeError, Result};
pub use graph::{EdgeCondition, Graph, GraphBuilder};
pub use hooks::Hooks;
pub use middleware::{apply as apply_middleware, Middleware};
pub use router::{Classifier, Router, RouterBuilder};
pub use runnable::{from_fn, identity, Context, Opts, Runnable, RunnableStream, Value};
pub use scatter::{Aggregator, ScatterGather, ScatterGatherBuilder};
pub use supervisor::{Strategy, Supervisor, SupervisorBuilder};
