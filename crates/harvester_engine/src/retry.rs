use std::future::Future;

use harvester_core::{Classified, RetryPolicy};
use tokio_util::sync::CancellationToken;

/// Runs `op` until it succeeds, fails with a non-retryable kind, or
/// `max_attempts` is used up. Returns the last result and the number of
/// attempts made.
///
/// `op` receives the 1-based attempt number. Backoff sleeps happen between
/// attempts, never after the last one.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    max_attempts: u32,
    mut op: F,
) -> (Result<T, E>, u32)
where
    E: Classified,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = op(attempt).await;
        match &result {
            Err(err) if attempt < max_attempts && policy.should_retry(err.kind(), attempt) => {
                tokio::time::sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
            _ => return (result, attempt),
        }
    }
}

/// How a cancellable retry loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Finished { result: Result<T, E>, attempts: u32 },
    /// The token fired before another attempt could start.
    Cancelled { attempts: u32 },
}

/// Like [`run_with_retry`], but no attempt starts once `cancel` has fired.
/// A backoff sleep in progress is cut short by cancellation.
pub async fn run_with_retry_until_cancelled<T, E, F, Fut>(
    policy: &RetryPolicy,
    max_attempts: u32,
    cancel: &CancellationToken,
    mut op: F,
) -> RetryOutcome<T, E>
where
    E: Classified,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = op(attempt).await;
        match &result {
            Err(err) if attempt < max_attempts && policy.should_retry(err.kind(), attempt) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(policy.backoff(attempt)) => {}
                }
                if cancel.is_cancelled() {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
                attempt += 1;
            }
            _ => {
                return RetryOutcome::Finished {
                    result,
                    attempts: attempt,
                }
            }
        }
    }
}
