//! Retry configuration and logic for storage operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before each retry, indexed by retry number. The last entry
    /// repeats once the schedule runs out.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.delays
            .get(retry)
            .or(self.delays.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Runs `op` until it succeeds, fails with an error `should_retry` rejects,
/// or the policy's attempts are spent. The last error observed is returned.
///
/// Delays are awaited sequentially on the calling task.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, should_retry: P, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts || !should_retry(&err) {
            return Err(err);
        }

        let delay = policy.delay_for((attempt - 1) as usize);
        warn!(
            attempt,
            max_attempts,
            error = %err,
            "Failed to reach the database, retrying in {:?}",
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Refused(u32),
        Conflict,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn transient(err: &TestError) -> bool {
        matches!(err, TestError::Refused(_))
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2), Duration::from_secs(5));
        assert_eq!(policy.delay_for(7), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_schedule_means_no_delay() {
        let policy = RetryPolicy::default().with_delays(vec![]);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_exhausts_schedule() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), TestError> = retry(&policy, transient, || {
            calls += 1;
            let n = calls;
            async move { Err(TestError::Refused(n)) }
        })
        .await;

        assert_eq!(calls, 4);
        // Last error wins.
        assert_eq!(result, Err(TestError::Refused(4)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(9), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_stops_immediately() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let mut calls = 0;

        let result: Result<(), TestError> = retry(&policy, transient, || {
            calls += 1;
            async { Err(TestError::Conflict) }
        })
        .await;

        assert_eq!(calls, 1);
        assert_eq!(result, Err(TestError::Conflict));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let mut calls = 0;

        let result = retry(&policy, transient, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    Err(TestError::Refused(n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_errors_follow_classification() {
        use crate::storage::StorageError;
        use std::io;

        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result: Result<(), StorageError> = retry(&policy, StorageError::is_transient, || {
            calls += 1;
            async {
                Err(StorageError::Database(sqlx::Error::Io(io::Error::from(
                    io::ErrorKind::ConnectionRefused,
                ))))
            }
        })
        .await;
        assert_eq!(calls, 4);
        assert!(matches!(result, Err(StorageError::Database(_))));

        let mut calls = 0;
        let result: Result<(), StorageError> = retry(&policy, StorageError::is_transient, || {
            calls += 1;
            async { Err(StorageError::UserAlreadyExists) }
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(StorageError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let mut calls = 0;
        let result: Result<(), TestError> = retry(&RetryPolicy::no_retry(), transient, || {
            calls += 1;
            async { Err(TestError::Refused(0)) }
        })
        .await;
        assert_eq!(calls, 1);
        assert!(result.is_err());
    }
}
