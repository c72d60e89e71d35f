//! Router: classifies input into a named route, then delegates.

use crate::error::{ComposeError, Result};
use crate::runnable::{Context, Opts, Runnable, RunnableStream, Value};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Classifies `input` into a route name. Returning an error aborts
/// resolution before any route is invoked.
pub type Classifier = Arc<dyn Fn(Context, Value) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Delegates to one of a table of named Runnables, chosen by a classifier,
/// with an optional fallback for unmatched routes.
pub struct Router {
    classifier: Classifier,
    routes: HashMap<String, Arc<dyn Runnable>>,
    fallback: Option<Arc<dyn Runnable>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    async fn resolve(&self, ctx: &Context, input: &Value) -> Result<Arc<dyn Runnable>> {
        let name = (self.classifier)(ctx.clone(), input.clone()).await.map_err(|e| {
            tracing::error!(error = %e, "router classifier failed");
            ComposeError::router_classifier(e)
        })?;

        if let Some(route) = self.routes.get(&name) {
            tracing::debug!(route = %name, "router matched route");
            return Ok(route.clone());
        }
        if let Some(fallback) = &self.fallback {
            tracing::debug!(route = %name, "router falling back");
            return Ok(fallback.clone());
        }
        tracing::warn!(route = %name, "router found no matching route or fallback");
        Err(ComposeError::unknown_route(name))
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    classifier: Option<Classifier>,
    routes: HashMap<String, Arc<dyn Runnable>>,
    fallback: Option<Arc<dyn Runnable>>,
}

impl RouterBuilder {
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn route(mut self, name: impl Into<String>, runnable: Arc<dyn Runnable>) -> Self {
        self.routes.insert(name.into(), runnable);
        self
    }

    pub fn fallback(mut self, runnable: Arc<dyn Runnable>) -> Self {
        self.fallback = Some(runnable);
        self
    }

    pub fn build(self) -> Result<Router> {
        let classifier = self
            .classifier
            .ok_or_else(|| ComposeError::validation("router has no classifier"))?;
        Ok(Router {
            classifier,
            routes: self.routes,
            fallback: self.fallback,
        })
    }
}

#[async_trait::async_trait]
impl Runnable for Router {
    async fn invoke(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<Value> {
        let span = tracing::debug_span!("router.invoke", trace_id = %ctx.trace_id());
        async move {
            let route = self.resolve(ctx, &input).await?;
            route.invoke(ctx, input, opts).await
        }
        .instrument(span)
        .await
    }

    async fn stream(&self, ctx: &Context, input: Value, opts: &Opts) -> Result<RunnableStream> {
        let span = tracing::debug_span!("router.stream", trace_id = %ctx.trace_id());
        async move {
            let route = self.resolve(ctx, &input).await?;
            route.stream(ctx, input, opts).await
        }
        .instrument(span)
        .await
    }
}
