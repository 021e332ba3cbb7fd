//! Retry policy and the single-step executor.
//!
//! A step attempt is retried with exponential backoff until it succeeds or
//! its retry budget is spent. Cancellation is polled before every attempt and
//! interrupts backoff sleeps.

use crate::cancellation::{sleep_or_cancel, with_timeout};
use crate::context::ExecutionContext;
use crate::errors::{FlowError, Result};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, trace};

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

/// Retry configuration for a step.
///
/// Attempt `i` failing with attempts remaining waits
/// `retry_delay_ms * 2^i` before attempt `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    #[serde(default)]
    pub retries: u32,
    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `retries` retries and the default delay.
    #[must_use]
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the total number of attempts (`retries + 1`).
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Calculates the backoff after the given failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

/// Executes one operation under a retry and timeout policy.
///
/// `operation` is called once per attempt with a snapshot of `ctx` whose
/// `retry_count` equals the attempt number. Panics inside an attempt are
/// caught and treated as step failures. When every attempt fails, the last
/// failure is returned, annotated with `step_name` if given.
pub async fn execute_step<T, F, Fut>(
    mut operation: F,
    ctx: &mut ExecutionContext,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    step_name: Option<&str>,
) -> Result<T>
where
    F: FnMut(ExecutionContext) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        ctx.token().check()?;
        ctx.set_retry_count(attempt);
        trace!(
            step_index = ctx.step_index(),
            step = ?step_name,
            attempt,
            "Starting step attempt"
        );

        let guarded = AssertUnwindSafe(operation(ctx.clone()))
            .catch_unwind()
            .map(|outcome| {
                outcome.unwrap_or_else(|payload| Err(FlowError::from_panic(payload.as_ref())))
            });

        match with_timeout(guarded, timeout).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries => {
                let delay = policy.backoff(attempt);
                debug!(
                    step_index = ctx.step_index(),
                    step = ?step_name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying step after error"
                );
                sleep_or_cancel(delay, ctx.token()).await?;
                attempt += 1;
            }
            Err(err) => return Err(err.with_step(step_name)),
        }
    }
}
