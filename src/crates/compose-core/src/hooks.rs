//! Hooks: composable lifecycle callbacks with short-circuit semantics.
//!
//! Hooks differ from [`crate::middleware::Middleware`]: middleware wraps
//! the whole Runnable and composes as layered invocations, while Hooks fire
//! at fixed observation points within a single invocation (`BeforeStep`,
//! `AfterStep`, `OnBranch`, `OnError`).

use crate::error::ComposeError;
use crate::runnable::{Context, Value};
use std::sync::Arc;

/// Fires before a step executes. Returning an error short-circuits the
/// remaining `before_step` hooks and aborts the step.
pub type BeforeStepHook = Arc<dyn Fn(&Context, &Value) -> Result<(), ComposeError> + Send + Sync>;

/// Fires after a step executes successfully. Cannot fail or short-circuit —
/// purely observational.
pub type AfterStepHook = Arc<dyn Fn(&Context, &Value, &Value) + Send + Sync>;

/// Fires when a branching pattern (Graph, Router, Supervisor) selects its
/// next destination. Returning an error short-circuits remaining
/// `on_branch` hooks and aborts the branch.
pub type OnBranchHook = Arc<dyn Fn(&Context, &str) -> Result<(), ComposeError> + Send + Sync>;

/// Fires when a step errors. Returning `Some(err)` replaces the propagated
/// error and short-circuits remaining `on_error` hooks; returning `None`
/// continues the chain. If no hook replaces the error, the original is
/// preserved.
pub type OnErrorHook = Arc<dyn Fn(&Context, &ComposeError) -> Option<ComposeError> + Send + Sync>;

/// A struct of optional callback slots. Nil (empty) slots are silently
/// skipped and never panic.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_step: Vec<BeforeStepHook>,
    pub after_step: Vec<AfterStepHook>,
    pub on_branch: Vec<OnBranchHook>,
    pub on_error: Vec<OnErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before_step(mut self, hook: BeforeStepHook) -> Self {
        self.before_step.push(hook);
        self
    }

    pub fn with_after_step(mut self, hook: AfterStepHook) -> Self {
        self.after_step.push(hook);
        self
    }

    pub fn with_on_branch(mut self, hook: OnBranchHook) -> Self {
        self.on_branch.push(hook);
        self
    }

    pub fn with_on_error(mut self, hook: OnErrorHook) -> Self {
        self.on_error.push(hook);
        self
    }

    /// Merge multiple Hooks into one. Callback lists are concatenated in
    /// argument order, so callbacks fire in composition order.
    pub fn compose(hooks: impl IntoIterator<Item = Hooks>) -> Hooks {
        let mut merged = Hooks::default();
        for h in hooks {
            merged.before_step.extend(h.before_step);
            merged.after_step.extend(h.after_step);
            merged.on_branch.extend(h.on_branch);
            merged.on_error.extend(h.on_error);
        }
        merged
    }

    /// Runs `before_step` hooks in order; the first error short-circuits
    /// the rest and is returned.
    pub fn fire_before_step(&self, ctx: &Context, input: &Value) -> Result<(), ComposeError> {
        for hook in &self.before_step {
            hook(ctx, input)?;
        }
        Ok(())
    }

    /// Runs every `after_step` hook; purely observational, cannot fail.
    pub fn fire_after_step(&self, ctx: &Context, input: &Value, output: &Value) {
        for hook in &self.after_step {
            hook(ctx, input, output);
        }
    }

    /// Runs `on_branch` hooks in order; the first error short-circuits the
    /// rest and is returned.
    pub fn fire_on_branch(&self, ctx: &Context, branch: &str) -> Result<(), ComposeError> {
        for hook in &self.on_branch {
            hook(ctx, branch)?;
        }
        Ok(())
    }

    /// Runs `on_error` hooks in order. The first hook to return `Some`
    /// replaces the error and short-circuits the rest; if every hook
    /// returns `None`, the original error is returned unchanged.
    pub fn fire_on_error(&self, ctx: &Context, err: ComposeError) -> ComposeError {
        for hook in &self.on_error {
            if let Some(replacement) = hook(ctx, &err) {
                return replacement;
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn before_step_short_circuits_on_first_error() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let first_calls2 = first_calls.clone();
        let second_calls2 = second_calls.clone();
        let hooks = Hooks::new()
            .with_before_step(Arc::new(move |_ctx, _input| {
                first_calls2.fetch_add(1, Ordering::SeqCst);
                Err(ComposeError::validation("first hook rejects"))
            }))
            .with_before_step(Arc::new(move |_ctx, _input| {
                second_calls2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));

        let ctx = Context::new();
        let result = hooks.fire_before_step(&ctx, &Value::Null);
        assert!(result.is_err());
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn on_error_replacement_short_circuits_remaining_hooks() {
        let second_ran = Arc::new(AtomicUsize::new(0));
        let second_ran2 = second_ran.clone();
        let hooks = Hooks::new()
            .with_on_error(Arc::new(|_ctx, _err| {
                Some(ComposeError::Custom("replaced".to_string()))
            }))
            .with_on_error(Arc::new(move |_ctx, _err| {
                second_ran2.fetch_add(1, Ordering::SeqCst);
                None
            }));

        let ctx = Context::new();
        let replaced = hooks.fire_on_error(&ctx, ComposeError::execution("original"));
        assert_eq!(replaced.to_string(), "replaced");
        assert_eq!(second_ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn on_error_preserves_original_when_all_hooks_decline() {
        let hooks = Hooks::new().with_on_error(Arc::new(|_ctx, _err| None));
        let ctx = Context::new();
        let original = ComposeError::execution("kept");
        let result = hooks.fire_on_error(&ctx, original);
        assert_eq!(result.to_string(), "execution failed: kept");
    }
}
