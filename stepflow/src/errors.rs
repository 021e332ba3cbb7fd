//! Error types for stepflow.
//!
//! Every failure surfaced by `run` or `run_many` is a single [`FlowError`].
//! Step functions report their own failures through `anyhow::Error`; those are
//! folded into [`FlowError::StepFailure`] unless they already carry a
//! `FlowError` (for example a nested flow that timed out), in which case the
//! original kind is preserved.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Main error type for flow execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The cancellation token was set at a poll point.
    #[error("Flow cancelled{}", reason_suffix(.reason))]
    Cancelled {
        /// The reason given to the token, if any.
        reason: Option<String>,
    },

    /// A step attempt exceeded its time budget.
    #[error("Step timed out after {duration_ms}ms{}", steps_suffix(.steps))]
    Timeout {
        /// The effective timeout that elapsed.
        duration_ms: u64,
        /// Names of the enclosing steps, innermost first.
        steps: Vec<String>,
    },

    /// The step function itself failed.
    #[error("{message}{}", steps_suffix(.steps))]
    StepFailure {
        /// The step function's error message.
        message: String,
        /// Names of the enclosing steps, innermost first.
        steps: Vec<String>,
    },

    /// An engine-level failure (task join errors, value type mismatches).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default()
}

fn steps_suffix(steps: &[String]) -> String {
    steps.iter().map(|name| at_step(name)).collect()
}

/// The suffix appended to failure messages of named steps.
#[must_use]
pub fn at_step(name: &str) -> String {
    format!(" (at step '{name}')")
}

impl FlowError {
    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: Option<String>) -> Self {
        Self::Cancelled { reason }
    }

    /// Creates a timeout error for the given budget.
    #[must_use]
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            steps: Vec::new(),
        }
    }

    /// Creates a step failure from a message.
    #[must_use]
    pub fn step_failure(message: impl Into<String>) -> Self {
        Self::StepFailure {
            message: message.into(),
            steps: Vec::new(),
        }
    }

    /// Converts a step function's error, keeping the kind of a wrapped `FlowError`.
    #[must_use]
    pub fn from_step_error(err: anyhow::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(flow_err) => flow_err,
            Err(err) => Self::step_failure(format!("{err:#}")),
        }
    }

    /// Converts a caught panic payload into a step failure.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::step_failure(format!("Step panicked: {detail}"))
    }

    /// Converts a tokio join error.
    #[must_use]
    pub fn from_join_error(err: &tokio::task::JoinError) -> Self {
        Self::Internal(format!("Task join error: {err}"))
    }

    /// Attaches a step name to a timeout or step failure.
    ///
    /// Names accumulate as an error crosses nested flows, so a failure inside
    /// an inner flow reads `... (at step 'inner') (at step 'outer')`. A name
    /// whose suffix the rendered message already carries is not added again.
    /// Cancellations and internal errors are returned untouched.
    #[must_use]
    pub fn with_step(mut self, name: Option<&str>) -> Self {
        let Some(name) = name else {
            return self;
        };
        if self.to_string().contains(&at_step(name)) {
            return self;
        }
        if let Self::Timeout { steps, .. } | Self::StepFailure { steps, .. } = &mut self {
            steps.push(name.to_string());
        }
        self
    }

    /// Returns true for [`FlowError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns true for [`FlowError::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the innermost step name attached to this error, if any.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        self.step_names().first().map(String::as_str)
    }

    /// Returns every attached step name, innermost first.
    #[must_use]
    pub fn step_names(&self) -> &[String] {
        match self {
            Self::Timeout { steps, .. } | Self::StepFailure { steps, .. } => steps,
            Self::Cancelled { .. } | Self::Internal(_) => &[],
        }
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_step_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_failure_display_with_name() {
        let err = FlowError::step_failure("boom").with_step(Some("parse"));
        assert_eq!(err.to_string(), "boom (at step 'parse')");
        assert_eq!(err.step_name(), Some("parse"));
    }

    #[test]
    fn test_suffix_not_duplicated() {
        let err = FlowError::step_failure("boom (at step 'parse')").with_step(Some("parse"));
        assert_eq!(err.to_string(), "boom (at step 'parse')");
        assert_eq!(err.step_name(), None);
    }

    #[test]
    fn test_nested_step_names_accumulate() {
        let err = FlowError::step_failure("boom")
            .with_step(Some("inner"))
            .with_step(Some("outer"));
        assert_eq!(err.to_string(), "boom (at step 'inner') (at step 'outer')");
        assert_eq!(err.step_name(), Some("inner"));
        assert_eq!(err.step_names(), ["inner".to_string(), "outer".to_string()]);

        let same = err.clone().with_step(Some("outer"));
        assert_eq!(same, err);
    }

    #[test]
    fn test_nested_timeout_keeps_both_names() {
        let err = FlowError::timeout(Duration::from_millis(3))
            .with_step(Some("fetch"))
            .with_step(Some("sync"));
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Step timed out after 3ms (at step 'fetch') (at step 'sync')"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = FlowError::timeout(Duration::from_millis(5));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Step timed out after 5ms");
        assert_eq!(
            err.with_step(Some("slow")).to_string(),
            "Step timed out after 5ms (at step 'slow')"
        );
    }

    #[test]
    fn test_cancelled_is_never_annotated() {
        let err = FlowError::cancelled(Some("shutdown".to_string())).with_step(Some("s"));
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Flow cancelled: shutdown");
    }

    #[test]
    fn test_from_step_error_preserves_flow_error() {
        let inner = anyhow::Error::new(FlowError::timeout(Duration::from_millis(7)));
        assert!(FlowError::from_step_error(inner).is_timeout());

        let plain = anyhow::anyhow!("disk full").context("writing output");
        assert_eq!(
            FlowError::from(plain),
            FlowError::step_failure("writing output: disk full")
        );
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = FlowError::from_panic(&"static message");
        assert_eq!(err.to_string(), "Step panicked: static message");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(
            FlowError::from_panic(owned.as_ref()).to_string(),
            "Step panicked: owned message"
        );
    }
}
