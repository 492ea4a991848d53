//! Bounded randomized-backoff retry for per-record index operations
//!
//! The retry loop is a counted loop with an explicit backoff function:
//! later attempts back off further, with random jitter so concurrently
//! failing records do not retry in lockstep.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Maximum write attempts per record.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Retry policy for lookup/write operations against the target index.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    /// Scale of one backoff step; tests run with `Duration::ZERO`.
    delay_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_unit: Duration) -> Self {
        Self {
            max_attempts,
            delay_unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the given 1-based attempt number: the previous
    /// attempt number plus a random jitter bounded by that same number,
    /// scaled by the delay unit. The first attempt has no delay.
    fn backoff(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        if step == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::random_range(0..step);
        self.delay_unit * (step + jitter)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// Exhaustion yields the last error; the caller counts it as a
    /// per-record failure and continues with the rest of the batch.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Attempt {attempt}/{} failed: {e:#}", self.max_attempts);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Retry budget is zero")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_failing_op_runs_exactly_max_attempts() {
        let policy = RetryPolicy::new(30, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow::anyhow!("index unavailable")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_success_terminates_the_loop() {
        let policy = RetryPolicy::new(30, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(anyhow::anyhow!("transient"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_attempt_success_calls_once() {
        let policy = RetryPolicy::new(30, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_with_attempt_number() {
        let policy = RetryPolicy::new(30, Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::ZERO);
        for attempt in 2..=5u32 {
            let step = attempt - 1;
            let delay = policy.backoff(attempt);
            assert!(delay >= Duration::from_secs(step.into()));
            assert!(delay < Duration::from_secs((2 * step).into()));
        }
    }
}
