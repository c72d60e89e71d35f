//! Reference Supervisor selection strategies. None of these are mandatory —
//! `compose_core::Supervisor` accepts any `Strategy` closure — but they
//! cover round-robin, skill-based delegation, and load balancing, grounded
//! on the counter/backoff-state idiom in `langgraph-core`'s task executor.

use compose_core::{Agent, ComposeError, Context, Strategy, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Cycles through `agents` using a monotonically incrementing counter.
pub fn round_robin() -> Strategy {
    let counter = Arc::new(AtomicUsize::new(0));
    Arc::new(move |_ctx: Context, _value: Value, agents: Arc<[Agent]>| {
        let counter = counter.clone();
        Box::pin(async move {
            if agents.is_empty() {
                return Ok(None);
            }
            let idx = counter.fetch_add(1, Ordering::SeqCst) % agents.len();
            Ok(Some(agents[idx].clone()))
        })
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 2)
        .collect()
}

/// Tokenizes the current value by whitespace and counts word overlaps
/// (ignoring tokens of length <= 2) against each agent's goal string,
/// case-insensitively; picks the highest-scoring agent. On a zero-score
/// tie, falls back to the first agent.
pub fn delegate_by_skill() -> Strategy {
    Arc::new(move |_ctx: Context, value: Value, agents: Arc<[Agent]>| {
        Box::pin(async move {
            if agents.is_empty() {
                return Ok(None);
            }
            let text = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let input_tokens = tokenize(&text);

            let mut best_idx = 0usize;
            let mut best_score = 0usize;
            for (idx, agent) in agents.iter().enumerate() {
                let goal_tokens = tokenize(agent.goal());
                let score = input_tokens
                    .iter()
                    .filter(|t| goal_tokens.contains(t))
                    .count();
                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }
            Ok(Some(agents[best_idx].clone()))
        })
    }) as Strategy
}

/// Maintains per-agent invocation counters and always picks the agent
/// with the lowest count, breaking ties by declaration order. The counter
/// table is keyed by agent identifier so it
/// survives the roster being passed in a different `Arc` instance each
/// call, as long as identifiers stay stable.
pub fn load_balanced() -> Strategy {
    let counts: Arc<Mutex<std::collections::HashMap<String, usize>>> =
        Arc::new(Mutex::new(std::collections::HashMap::new()));
    Arc::new(move |_ctx: Context, _value: Value, agents: Arc<[Agent]>| {
        let counts = counts.clone();
        Box::pin(async move {
            if agents.is_empty() {
                return Ok(None);
            }
            let mut table = counts.lock().map_err(|_| ComposeError::execution("load-balanced strategy lock poisoned"))?;
            let mut best_idx = 0usize;
            let mut best_count = usize::MAX;
            for (idx, agent) in agents.iter().enumerate() {
                let count = *table.get(agent.id()).unwrap_or(&0);
                if count < best_count {
                    best_count = count;
                    best_idx = idx;
                }
            }
            let chosen = &agents[best_idx];
            *table.entry(chosen.id().to_string()).or_insert(0) += 1;
            Ok(Some(chosen.clone()))
        })
    }) as Strategy
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_core::runnable::from_fn;

    fn agent(id: &'static str, goal: &'static str) -> Agent {
        Agent::new(id, goal, from_fn(move |_ctx, _input, _opts| {
            Box::pin(async move { Ok(Value::from(id)) })
        }))
    }

    #[tokio::test]
    async fn round_robin_cycles_through_agents_in_order() {
        let strategy = round_robin();
        let agents: Arc<[Agent]> = vec![agent("a", ""), agent("b", ""), agent("c", "")].into();

        let mut picks = Vec::new();
        for _ in 0..4 {
            let picked = strategy(Context::new(), Value::Null, agents.clone()).await.unwrap().unwrap();
            picks.push(picked.id().to_string());
        }
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn delegate_by_skill_picks_highest_overlap() {
        let strategy = delegate_by_skill();
        let agents: Arc<[Agent]> = vec![
            agent("billing", "handles refunds and invoices"),
            agent("support", "handles password resets and logins"),
        ]
        .into();

        let picked = strategy(Context::new(), Value::from("I need a refund for my invoice"), agents)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id(), "billing");
    }

    #[tokio::test]
    async fn delegate_by_skill_falls_back_to_first_agent_on_zero_score_tie() {
        let strategy = delegate_by_skill();
        let agents: Arc<[Agent]> = vec![agent("first", "xyz"), agent("second", "abc")].into();

        let picked = strategy(Context::new(), Value::from("totally unrelated query"), agents)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id(), "first");
    }

    #[tokio::test]
    async fn load_balanced_picks_lowest_count_and_breaks_ties_by_order() {
        let strategy = load_balanced();
        let agents: Arc<[Agent]> = vec![agent("a", ""), agent("b", "")].into();

        let first = strategy(Context::new(), Value::Null, agents.clone()).await.unwrap().unwrap();
        assert_eq!(first.id(), "a");
        let second = strategy(Context::new(), Value::Null, agents.clone()).await.unwrap().unwrap();
        assert_eq!(second.id(), "b");
        let third = strategy(Context::new(), Value::Null, agents).await.unwrap().unwrap();
        assert_eq!(third.id(), "a");
    }
}
