//! Per-run execution context handed to step functions.

use crate::cancellation::CancellationToken;
use uuid::Uuid;

/// The mutable context for one flow run.
///
/// A context is owned by a single `run` invocation and updated as that run
/// moves through its steps. Step functions receive a snapshot clone taken at
/// the start of each attempt, so they observe the current step index, step
/// name and retry count.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Identifier of the run, for log correlation.
    run_id: Uuid,
    /// Token polled before every step and attempt.
    token: CancellationToken,
    /// Index of the step being executed.
    step_index: usize,
    /// Name of the step being executed, if it has one.
    step_name: Option<String>,
    /// Zero-based attempt number of the current step.
    retry_count: u32,
}

impl ExecutionContext {
    /// Creates a context for a new run.
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            token,
            step_index: 0,
            step_name: None,
            retry_count: 0,
        }
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the cancellation token for this run.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns whether the run's token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the index of the current step.
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Returns the name of the current step.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        self.step_name.as_deref()
    }

    /// Returns the current attempt number, starting at zero.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn enter_step(&mut self, index: usize, name: Option<String>) {
        self.step_index = index;
        self.step_name = name;
        self.retry_count = 0;
    }

    pub(crate) fn set_retry_count(&mut self, attempt: u32) {
        self.retry_count = attempt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_defaults() {
        let ctx = ExecutionContext::new(CancellationToken::new());
        assert_eq!(ctx.step_index(), 0);
        assert_eq!(ctx.step_name(), None);
        assert_eq!(ctx.retry_count(), 0);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_enter_step_resets_retry_count() {
        let mut ctx = ExecutionContext::new(CancellationToken::new());
        ctx.set_retry_count(3);
        ctx.enter_step(2, Some("load".to_string()));

        assert_eq!(ctx.step_index(), 2);
        assert_eq!(ctx.step_name(), Some("load"));
        assert_eq!(ctx.retry_count(), 0);
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut ctx = ExecutionContext::new(CancellationToken::new());
        let snapshot = ctx.clone();
        ctx.set_retry_count(1);

        assert_eq!(snapshot.retry_count(), 0);
        assert_eq!(snapshot.run_id(), ctx.run_id());
    }

    #[test]
    fn test_token_is_shared_with_snapshots() {
        let ctx = ExecutionContext::new(CancellationToken::new());
        let snapshot = ctx.clone();
        ctx.token().cancel("stop");
        assert!(snapshot.is_cancelled());
    }

    #[test]
    fn test_distinct_runs_get_distinct_ids() {
        let a = ExecutionContext::new(CancellationToken::new());
        let b = ExecutionContext::new(CancellationToken::new());
        assert_ne!(a.run_id(), b.run_id());
    }
}
