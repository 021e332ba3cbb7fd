//! Mock transforms for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::stages::Transform;

/// A pass-through transform that records every call.
#[derive(Debug)]
pub struct RecordingTransform<T> {
    inputs: Mutex<Vec<T>>,
    retry_counts: Mutex<Vec<u32>>,
    delay: Option<Duration>,
}

impl<T> RecordingTransform<T> {
    /// Creates a new recording transform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            retry_counts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps for `delay` before returning each input.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns the retry count observed on each call.
    #[must_use]
    pub fn retry_counts(&self) -> Vec<u32> {
        self.retry_counts.lock().clone()
    }
}

impl<T> Default for RecordingTransform<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RecordingTransform<T> {
    /// Returns the inputs received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<T> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Transform<T, T> for RecordingTransform<T> {
    async fn apply(&self, input: T, ctx: ExecutionContext) -> anyhow::Result<T> {
        self.inputs.lock().push(input.clone());
        self.retry_counts.lock().push(ctx.retry_count());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(input)
    }
}

/// A pass-through transform that fails its first `failures` calls.
#[derive(Debug)]
pub struct FlakyTransform {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyTransform {
    /// Creates a transform that fails `failures` times before succeeding.
    #[must_use]
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Transform<T, T> for FlakyTransform {
    async fn apply(&self, input: T, _ctx: ExecutionContext) -> anyhow::Result<T> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("transient failure {}", call + 1);
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(CancellationToken::new())
    }

    #[tokio::test]
    async fn test_recording_transform() {
        let mock = RecordingTransform::new();
        assert_eq!(mock.apply(1, ctx()).await.unwrap(), 1);
        assert_eq!(mock.apply(2, ctx()).await.unwrap(), 2);

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.inputs(), vec![1, 2]);
        assert_eq!(mock.retry_counts(), vec![0, 0]);
    }

    #[tokio::test]
    async fn test_flaky_transform() {
        let mock = FlakyTransform::new(2);
        assert!(Transform::<u8, u8>::apply(&mock, 1, ctx()).await.is_err());
        assert!(Transform::<u8, u8>::apply(&mock, 1, ctx()).await.is_err());
        assert_eq!(Transform::<u8, u8>::apply(&mock, 1, ctx()).await.unwrap(), 1);
        assert_eq!(mock.call_count(), 3);
    }
}
