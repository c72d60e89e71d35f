//! Cache middleware: memoizes a wrapped [`Runnable`]'s `invoke` results,
//! simplified from `langgraph-core`'s generic `Cache<K, V>` (entry
//! metadata + TTL expiration, no eviction-policy bookkeeping since a
//! single Runnable's result set is small and callers control the TTL
//! directly).

use compose_core::runnable::{from_fn, Context, Opts, Value};
use compose_core::{Middleware, Runnable};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|e| Instant::now() > e).unwrap_or(false)
    }
}

/// Cache key: the JSON-serialized input value. Options are deliberately
/// excluded from the key — `Opts` is opaque per-call configuration the
/// core never interprets, so two calls with the same input but different
/// opts are still treated as the same cached computation, matching how
/// `langgraph-core`'s node cache keys purely on node id + input hash.
fn cache_key(input: &Value) -> String {
    input.to_string()
}

/// Builds a [`Middleware`] that memoizes `invoke` results for `ttl`
/// (`None` means entries never expire).
pub fn cache(ttl: Option<Duration>) -> Middleware {
    let storage: Arc<RwLock<HashMap<String, CacheEntry>>> = Arc::new(RwLock::new(HashMap::new()));
    Arc::new(move |inner| {
        let storage = storage.clone();
        from_fn(move |ctx: Context, input: Value, opts: Opts| {
            let inner = inner.clone();
            let storage = storage.clone();
            Box::pin(async move {
                let key = cache_key(&input);

                {
                    let table = storage.read().await;
                    if let Some(entry) = table.get(&key) {
                        if !entry.is_expired() {
                            tracing::debug!(%key, "cache middleware: hit");
                            return Ok(entry.value.clone());
                        }
                    }
                }

                tracing::debug!(%key, "cache middleware: miss");
                let result = inner.invoke(&ctx, input, &opts).await?;

                let mut table = storage.write().await;
                table.insert(
                    key,
                    CacheEntry {
                        value: result.clone(),
                        expires_at: ttl.map(|d| Instant::now() + d),
                    },
                );
                Ok(result)
            })
        })
    })
}
