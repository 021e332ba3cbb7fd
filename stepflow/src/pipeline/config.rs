//! Configuration for flows and runs.

use super::RetryPolicy;
use crate::cancellation::CancellationToken;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flow-level defaults that can be loaded from configuration files.
///
/// ```json
/// { "timeout_ms": 5000, "retry": { "retries": 3, "retry_delay_ms": 50 } }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowDefaults {
    /// Timeout applied to steps that define none, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Retry policy applied to steps that define none.
    pub retry: Option<RetryPolicy>,
}

impl FlowDefaults {
    /// Parses defaults from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the default timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Options for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Token for this run; falls back to the flow's default token.
    pub token: Option<CancellationToken>,
}

impl RunOptions {
    /// Creates empty run options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }
}

/// Options for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Token shared by every run of the batch; falls back to the flow's
    /// default token.
    pub token: Option<CancellationToken>,
    /// Maximum number of runs in flight. `None`, `0` or a value at least the
    /// number of inputs means one concurrent run per input.
    pub concurrency: Option<usize>,
}

impl BatchOptions {
    /// Creates empty batch options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Resolves the number of workers for `total` inputs.
    #[must_use]
    pub fn worker_count(&self, total: usize) -> usize {
        match self.concurrency {
            Some(limit) if limit > 0 && limit < total => limit,
            _ => total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flow_defaults_empty_json() {
        let defaults = FlowDefaults::from_json("{}").unwrap();
        assert_eq!(defaults, FlowDefaults::default());
        assert_eq!(defaults.timeout(), None);
    }

    #[test]
    fn test_flow_defaults_full_json() {
        let defaults = FlowDefaults::from_json(
            r#"{"timeout_ms": 1500, "retry": {"retries": 3, "retry_delay_ms": 50}}"#,
        )
        .unwrap();
        assert_eq!(defaults.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(
            defaults.retry,
            Some(RetryPolicy::new(3).with_delay(Duration::from_millis(50)))
        );
    }

    #[test]
    fn test_flow_defaults_rejects_bad_types() {
        assert!(FlowDefaults::from_json(r#"{"timeout_ms": "soon"}"#).is_err());
    }

    #[test]
    fn test_worker_count() {
        let unset = BatchOptions::new();
        assert_eq!(unset.worker_count(10), 10);
        assert_eq!(BatchOptions::new().with_concurrency(0).worker_count(10), 10);
        assert_eq!(BatchOptions::new().with_concurrency(4).worker_count(10), 4);
        assert_eq!(BatchOptions::new().with_concurrency(10).worker_count(10), 10);
        assert_eq!(BatchOptions::new().with_concurrency(64).worker_count(10), 10);
    }
}
