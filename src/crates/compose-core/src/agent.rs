//! Agent: a [`Runnable`] leaf that additionally carries an identifier and a
//! descriptive "goal" string.
//!
//! Selection strategies (Supervisor's `strategy`, the skill-based
//! reference strategy in `compose-prebuilt`) consume the metadata-bearing
//! view rather than the bare Runnable.

use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// A Runnable plus the small metadata record selection strategies read:
/// a stable `id` (used in error wrapping — "Supervisor agent 'id'",
/// "Blackboard agent 'id' round N") and a free-form `goal` description
/// (consumed by the delegate-by-skill strategy in `compose-prebuilt`).
#[derive(Clone)]
pub struct Agent {
    id: String,
    goal: String,
    runnable: Arc<dyn Runnable>,
}

impl Agent {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, runnable: Arc<dyn Runnable>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            runnable,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn runnable(&self) -> &Arc<dyn Runnable> {
        &self.runnable
    }
}

#[async_trait]
impl Runnable for Agent {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> crate::error::Result<Value> {
        self.runnable.invoke(ctx, input, opts).await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> crate::error::Result<RunnableStream> {
        self.runnable.stream(ctx, input, opts).await
    }
}

/// Renders an arbitrary `Value` as the string agents consume. Strings pass
/// through unchanged; every other JSON value is serialized.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
