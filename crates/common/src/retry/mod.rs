//! Retry policy for outbound collaborator calls
//!
//! Up to `max_attempts` tries. After failed attempt `n` the wait is
//! `base * 2^(n-1) + base * 0.1 * n`: exponential growth plus a jitter term
//! that grows linearly with the attempt number. Only transient errors are
//! retried; permanent ones return immediately. Callers decide how to degrade
//! once the policy gives up.

use crate::config::RetryConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base = self.base_delay.as_nanos();
        let exponential = base.saturating_mul(1u128 << (attempt - 1).min(63));
        let jitter = base * attempt as u128 / 10;
        let nanos = exponential.saturating_add(jitter);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// The wait schedule as a `Backoff`
    pub fn schedule(&self) -> AttemptBackoff {
        AttemptBackoff {
            policy: *self,
            failed_attempts: 0,
        }
    }

    /// Run `op` under the policy, logging each wait
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_notify(op, |err, wait| {
            metrics::record_retry(operation);
            warn!(
                operation = operation,
                error = %err,
                code = ?err.code(),
                wait_ms = wait.as_millis() as u64,
                "Transient failure, backing off"
            );
        })
        .await
    }

    /// Run `op` under the policy, calling `notify` before every wait
    pub async fn run_notify<T, F, Fut, N>(&self, mut op: F, mut notify: N) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        N: FnMut(&AppError, Duration),
    {
        backoff::future::retry_notify(
            self.schedule(),
            || {
                let attempt = op();
                async move {
                    attempt.await.map_err(|e| {
                        if e.is_transient() {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |err: AppError, wait: Duration| notify(&err, wait),
        )
        .await
    }
}

/// Backoff that stops after the policy's attempt budget is spent
#[derive(Debug, Clone)]
pub struct AttemptBackoff {
    policy: RetryPolicy,
    failed_attempts: u32,
}

impl Backoff for AttemptBackoff {
    fn reset(&mut self) {
        self.failed_attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.failed_attempts += 1;
        if self.failed_attempts >= self.policy.max_attempts {
            None
        } else {
            Some(self.policy.delay_for(self.failed_attempts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<Result<&'static str>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures {
                Err(AppError::RateLimited {
                    service: "stub".into(),
                    retry_after: None,
                })
            } else {
                Ok("done")
            })
        }
    }

    #[test]
    fn test_delay_formula() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4300));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8400));
    }

    #[test]
    fn test_schedule_stops_after_budget() {
        let mut schedule = RetryPolicy::new(5, Duration::from_millis(10)).schedule();
        let waits: Vec<_> = std::iter::from_fn(|| schedule.next_backoff()).collect();
        assert_eq!(waits.len(), 4);

        schedule.reset();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(11)));
    }

    #[tokio::test]
    async fn test_succeeds_after_four_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let mut waits = Vec::new();

        let result = policy
            .run_notify(flaky(4, calls.clone()), |_, wait| waits.push(wait))
            .await;

        assert_eq!(assert_ok!(result), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            waits,
            vec![
                Duration::from_micros(1100),
                Duration::from_micros(2200),
                Duration::from_micros(4300),
                Duration::from_micros(8400),
            ]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_five_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let mut waits = 0;

        let result = policy
            .run_notify(flaky(5, calls.clone()), |_, _| waits += 1)
            .await;

        let err = assert_err!(result);
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(waits, 4);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = policy
            .run("update_record", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(AppError::Upstream {
                    service: "stub".into(),
                    message: "validation failed".into(),
                }))
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
