//! The [`Runnable`] contract: the single abstraction every composition
//! pattern and every leaf computation (model call, tool, agent) implements.
//!
//! A Runnable exposes a blocking `invoke` returning one value and a lazy
//! `stream` returning a pull-driven sequence of values. Invoking and
//! collecting the final streamed
//! value agree; [`Runnable::stream`]'s default implementation gets this for
//! free by deriving a single-item stream from `invoke`, which is exactly
//! what leaf computations with no natural streaming behavior want. Patterns
//! that have real streaming behavior (Chain, Graph, Router, Supervisor,
//! Blackboard) override it.

use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The opaque "any" type patterns pass between steps. `serde_json::Value`
/// is the natural top type for a dynamically-typed composition core in
/// Rust: it's already `Clone`, `Send`, `Sync`, and serializable.
pub use serde_json::Value;

/// A finite, lazy, pull-driven sequence of results. Rust's `futures::Stream`
/// is pull-driven by construction (the consumer calls `.next()`), so no
/// custom channel plumbing is needed to get pull semantics. Consumer
/// abandonment is simply dropping the
/// stream; `async-stream`-backed producers release their resources via
/// ordinary `Drop` when that happens.
pub type RunnableStream = BoxStream<'static, Result<Value>>;

/// Cancellation context threaded through every `invoke`/`stream` call.
///
/// Wraps a [`tokio_util::sync::CancellationToken`] — the idiomatic minimal
/// primitive for cooperative cancellation in the tokio ecosystem. `child()`
/// derives a token that is cancelled whenever its parent is, which is what
/// lets Scatter/Gather's timeout reach every worker.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    trace_id: uuid::Uuid,
}

impl Context {
    /// A fresh, unrelated, non-cancelled context with a new correlation
    /// id for tracing: every `tracing` event a pattern emits carries this
    /// id so a single invocation's events can be correlated across nested
    /// Runnables.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            trace_id: uuid::Uuid::new_v4(),
        }
    }

    /// Wrap an existing token (for callers who manage cancellation
    /// externally).
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            trace_id: uuid::Uuid::new_v4(),
        }
    }

    /// The correlation id tracing events should attach to this
    /// invocation's spans/events.
    pub fn trace_id(&self) -> uuid::Uuid {
        self.trace_id
    }

    /// Derive a child context: cancelling `self` also cancels the child,
    /// but cancelling the child does not affect `self`. The trace id is
    /// inherited so nested Runnables log under the same correlation id as
    /// their parent invocation.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            trace_id: self.trace_id,
        }
    }

    /// Derive a child context that is additionally cancelled after `dur`
    /// elapses. Used by Scatter/Gather to implement its optional timeout:
    /// the deadline applies to every worker because they all share (or
    /// derive from) this child token.
    pub fn with_timeout(&self, dur: Duration) -> Self {
        let child = self.child();
        let token = child.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(dur) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
        child
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves once this context is cancelled. Useful in `tokio::select!`
    /// inside leaf Runnables that need to race their own work against
    /// cancellation.
    pub async fn cancelled(&self) {
        self.token.clone().cancelled_owned().await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque per-call configuration forwarded verbatim by every pattern to the
/// Runnables it wraps. The core never interprets or rewrites entries;
/// patterns only ever pass `opts` through unchanged.
#[derive(Clone, Debug, Default)]
pub struct Opts(Arc<HashMap<String, Value>>);

impl Opts {
    pub fn new() -> Self {
        Self(Arc::new(HashMap::new()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a new `Opts` with `key` set, leaving `self` untouched.
    pub fn with(&self, key: impl Into<String>, value: Value) -> Self {
        let mut map = (*self.0).clone();
        map.insert(key.into(), value);
        Self(Arc::new(map))
    }
}

/// The root abstraction. Any pattern, any leaf operation (model
/// call, tool, agent) implements this. Implementations must observe `ctx`'s
/// cancellation before each externally visible side effect and return
/// promptly with [`crate::error::ComposeError::Cancelled`] once it fires.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Blocks until a single result is available.
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value>;

    /// Returns a lazy sequence of results. The default derives a
    /// single-item stream from `invoke`, satisfying the Invoke/Stream
    /// consistency invariant automatically for leaves that have no
    /// incremental output of their own.
    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let result = self.invoke(ctx, input, opts).await;
        Ok(stream_once(result))
    }
}

#[async_trait]
impl Runnable for Arc<dyn Runnable> {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        (**self).invoke(ctx, input, opts).await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        (**self).stream(ctx, input, opts).await
    }
}

/// Wrap a single `Result<Value>` as a one-item (or one-error) stream —
/// the Invoke-derived default every leaf Runnable gets, and the shape every
/// pattern's own `stream` falls back to when it only has a final value to
/// offer (e.g. Scatter/Gather, Router after resolution already ran
/// end-to-end).
pub fn stream_once(result: Result<Value>) -> RunnableStream {
    Box::pin(stream::once(async move { result }))
}

/// Adapts a plain async closure into a [`Runnable`] — the leaf-construction
/// idiom used throughout this crate's tests and by simple tools/agents that
/// have no streaming behavior of their own.
pub struct FnRunnable<F>(F);

impl<F> FnRunnable<F>
where
    F: Fn(Context, Value, Opts) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Arc<dyn Runnable> {
        Arc::new(Self(f))
    }
}

#[async_trait]
impl<F> Runnable for FnRunnable<F>
where
    F: Fn(Context, Value, Opts) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
{
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        (self.0)(ctx.clone(), input, opts.clone()).await
    }
}

/// Construct a leaf [`Runnable`] from an async closure.
///
/// ```
/// use compose_core::runnable::{from_fn, Context, Opts};
/// use compose_core::Runnable;
///
/// # #[tokio::main]
/// # async fn main() {
/// let upper = from_fn(|_ctx, input, _opts| Box::pin(async move {
///     Ok(serde_json::Value::String(input.as_str().unwrap_or_default().to_uppercase()))
/// }));
/// let out = upper.invoke(&Context::new(), "hi".into(), &Opts::new()).await.unwrap();
/// assert_eq!(out, "HI");
/// # }
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn Runnable>
where
    F: Fn(Context, Value, Opts) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
{
    FnRunnable::new(f)
}

/// The identity Runnable: returns its input unchanged. Used as the base
/// case for an empty Chain and in identity-property tests.
pub fn identity() -> Arc<dyn Runnable> {
    from_fn(|_ctx, input, _opts| Box::pin(async move { Ok(input) }))
}
