//! Waits composed with cancellation and time limits.

use super::CancellationToken;
use crate::errors::{FlowError, Result};
use std::future::Future;
use std::time::Duration;

/// Sleeps for `duration` unless the token is cancelled first.
///
/// Fails with [`FlowError::Cancelled`] if the token is already set or becomes
/// set during the sleep.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<()> {
    token.check()?;
    tokio::select! {
        biased;
        () = token.cancelled() => Err(FlowError::cancelled(token.reason())),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Races `fut` against an optional time limit.
///
/// When the limit elapses first the future is dropped, which stops it at its
/// next suspension point, and the result is [`FlowError::Timeout`].
pub async fn with_timeout<F, T>(fut: F, limit: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(FlowError::timeout(limit))),
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let token = CancellationToken::new();
        let start = Instant::now();
        sleep_or_cancel(Duration::from_millis(40), &token).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancel() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel("stop");
        });

        let start = Instant::now();
        let err = sleep_or_cancel(Duration::from_secs(60), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_sleep_on_cancelled_token_fails_immediately() {
        let token = CancellationToken::new();
        token.cancel("already");
        let err = sleep_or_cancel(Duration::from_secs(60), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(1)
        };
        let err = with_timeout(slow, Some(Duration::from_millis(5)))
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::timeout(Duration::from_millis(5)));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        assert_eq!(with_timeout(async { Ok(3) }, None).await, Ok(3));
        assert_eq!(
            with_timeout(async { Ok(4) }, Some(Duration::from_secs(1))).await,
            Ok(4)
        );
    }
}
