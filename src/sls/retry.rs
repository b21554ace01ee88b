//! Retry loop
//!
//! Runs an API call until it succeeds, fails with a non-retryable error, or
//! the deadline passes. Waits grow linearly: the first wait is `first_wait`, each
//! following wait adds `wait_step` (3s, 8s, 13s, ... by default).
//!
//! The wait sequence is a [`backon::BackoffBuilder`], so the same policy drives
//! both API retries and state polling.

use super::error::SlsError;
use backon::{BackoffBuilder, Retryable};
use std::future::Future;
use std::time::{Duration, Instant};

/// First wait before retrying
pub const DEFAULT_FIRST_WAIT: Duration = Duration::from_secs(3);

/// Amount added to every subsequent wait
pub const DEFAULT_WAIT_STEP: Duration = Duration::from_secs(5);

/// Deadline for read operations
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Backoff settings shared by all operations of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub first_wait: Duration,
    pub wait_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_wait: DEFAULT_FIRST_WAIT,
            wait_step: DEFAULT_WAIT_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn new(first_wait: Duration, wait_step: Duration) -> Self {
        Self {
            first_wait,
            wait_step,
        }
    }

    /// Bound this policy by a total time budget
    pub fn until(self, timeout: Duration) -> IncrementalBuilder {
        IncrementalBuilder {
            policy: self,
            timeout,
        }
    }
}

/// Builds a [`DeadlineBackoff`]; the deadline starts counting at `build()`
#[derive(Debug, Clone, Copy)]
pub struct IncrementalBuilder {
    policy: RetryPolicy,
    timeout: Duration,
}

impl BackoffBuilder for IncrementalBuilder {
    type Backoff = DeadlineBackoff;

    fn build(self) -> Self::Backoff {
        let started = Instant::now();
        DeadlineBackoff {
            policy: self.policy,
            started,
            deadline: started.checked_add(self.timeout),
            attempt: 0,
        }
    }
}

/// Linear wait sequence that ends when the next wait would pass the deadline.
///
/// The first wait is always granted, shortened to whatever budget is left,
/// so a transient error is retried at least once even under a tiny timeout.
#[derive(Debug, Clone)]
pub struct DeadlineBackoff {
    policy: RetryPolicy,
    started: Instant,
    deadline: Option<Instant>,
    attempt: u32,
}

impl DeadlineBackoff {
    /// Time since the sequence was built
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Iterator for DeadlineBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.policy.first_wait + self.policy.wait_step * self.attempt;
        let delay = match self.deadline {
            None => delay,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if delay <= remaining {
                    delay
                } else if self.attempt == 0 {
                    remaining
                } else {
                    return None;
                }
            }
        };
        self.attempt += 1;
        Some(delay)
    }
}

/// Run `op` until it returns Ok, a non-retryable error, or `timeout` elapses.
/// On timeout the last retryable error is returned inside [`SlsError::Timeout`].
pub async fn retry<T, F, Fut>(timeout: Duration, policy: RetryPolicy, op: F) -> Result<T, SlsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SlsError>>,
{
    let started = Instant::now();

    let result = op
        .retry(policy.until(timeout))
        .sleep(tokio::time::sleep)
        .when(SlsError::is_retryable)
        .notify(|err: &SlsError, delay: Duration| {
            tracing::warn!("Retrying in {:?}: {}", delay, err);
        })
        .await;

    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            let elapsed = started.elapsed();
            tracing::warn!("Giving up after {:?}: {}", elapsed, err);
            Err(SlsError::Timeout {
                elapsed,
                last: Box::new(err),
            })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn throttled() -> SlsError {
        SlsError::Api {
            status: 429,
            code: "Throttling".to_string(),
            message: "slow down".to_string(),
            request_id: "-".to_string(),
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(5), Duration::from_millis(5))
    }

    #[test]
    fn test_incremental_wait_sequence() {
        let waits: Vec<Duration> = RetryPolicy::default()
            .until(Duration::from_secs(60))
            .build()
            .take(3)
            .collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(8),
                Duration::from_secs(13)
            ]
        );
    }

    #[test]
    fn test_waits_stop_before_deadline() {
        let waits: Vec<Duration> = RetryPolicy::default()
            .until(Duration::from_secs(10))
            .build()
            .collect();
        assert_eq!(waits, vec![Duration::from_secs(3), Duration::from_secs(8)]);
    }

    #[test]
    fn test_first_wait_shortened_to_budget() {
        let mut waits = RetryPolicy::default().until(Duration::from_secs(1)).build();
        let first = waits.next().unwrap();
        assert!(first <= Duration::from_secs(1));
        assert_eq!(waits.next(), None);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry(Duration::from_secs(5), fast(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(throttled())
            } else {
                Ok("done")
            }
        })
        .await;

        tokio_test::assert_ok!(&result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry(Duration::from_secs(5), fast(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SlsError::not_found("Project", "demo"))
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_keeps_last_error() {
        let result: Result<(), _> = retry(Duration::from_millis(30), fast(), || async {
            Err(throttled())
        })
        .await;

        match result {
            Err(SlsError::Timeout { last, .. }) => assert_eq!(last.code(), Some("Throttling")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_below_first_wait_still_retries_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry(
            Duration::from_millis(1),
            RetryPolicy::default(),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            },
        )
        .await;

        assert!(matches!(result, Err(SlsError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
