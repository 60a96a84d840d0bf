//! Bounded retry with exponential backoff and cancellation.
//!
//! Retries are only ever applied to safely-repeatable operations: GET
//! fetches, individual object uploads/deletes (unconditional overwrite)
//! and the status POST. The cancellation channel is checked between
//! attempts so process termination aborts promptly instead of sleeping
//! through a backoff window.

use crate::error::{GateError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Retry budget and backoff shape for one operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be >= 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per subsequent attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Backoff before attempt `n + 1` (zero-based `n` completed attempts).
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Cancellation handle shared between the orchestrator and retry loops.
///
/// The sender side flips to `true` when the run should stop; receivers
/// observe it between retry attempts and while sleeping.
pub fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Only errors for which [`GateError::is_retryable`] holds are retried;
/// everything else surfaces immediately. After the final attempt the last
/// error is returned unchanged, so a permanently failing network call
/// yields its `Transient`/`Network` error only once the budget is spent.
pub async fn retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &mut watch::Receiver<bool>,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        if *cancel.borrow() {
            return Err(GateError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    op = %label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable failure, backing off"
                );
                // Sleep, but wake immediately on cancellation.
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = cancel.changed() => {
                        if changed.is_ok() && *cancel.borrow() {
                            return Err(GateError::Cancelled);
                        }
                    }
                }
                attempt += 1;
            }
            Err(err) => {
                debug!(op = %label, attempt, error = %err, "Operation failed");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let (_tx, mut rx) = cancel_channel();
        let result = retry(fast_policy(3), &mut rx, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, GateError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let (_tx, mut rx) = cancel_channel();
        let result: Result<()> = retry(fast_policy(3), &mut rx, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GateError::Transient("502".into())) }
        })
        .await;
        assert!(matches!(result, Err(GateError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_surfaces_immediately() {
        let calls = AtomicU32::new(0);
        let (_tx, mut rx) = cancel_channel();
        let result: Result<()> = retry(fast_policy(5), &mut rx, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GateError::Auth("nope".into())) }
        })
        .await;
        assert!(matches!(result, Err(GateError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_before_budget_spent() {
        let calls = AtomicU32::new(0);
        let (_tx, mut rx) = cancel_channel();
        let result = retry(fast_policy(3), &mut rx, "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(GateError::Network("refused".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let calls = AtomicU32::new(0);
        let (tx, mut rx) = cancel_channel();
        tx.send(true).unwrap();
        let result: Result<()> = retry(fast_policy(3), &mut rx, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(GateError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let (tx, mut rx) = cancel_channel();
        let policy = RetryPolicy::new(3, Duration::from_secs(60));
        let fut = retry(policy, &mut rx, "op", || async {
            Err::<(), _>(GateError::Transient("502".into()))
        });
        // Cancel while the first backoff sleep is pending.
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(true).unwrap();
        };
        let (result, _) = tokio::join!(fut, cancel);
        assert!(matches!(result, Err(GateError::Cancelled)));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }
}
