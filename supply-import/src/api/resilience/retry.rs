//! Retry with a fixed backoff schedule
//!
//! Every call site that waits on the backend (re-reading a course, verifying a
//! fresh record, persisting versions) uses the same loop with its own schedule
//! and error classification.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use crate::api::StoreError;

/// Errors that know whether another attempt could succeed
pub trait RetryableError: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

/// Retry schedules for the import steps that wait on the backend
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Base delay for the linear schedules
    pub base_delay: Duration,
    /// Attempts when re-reading a course's versions before appending
    pub fetch_versions_attempts: u32,
    /// Attempts when verifying that a course resolves by id
    pub verify_attempts: u32,
    /// Delays between verification attempts
    pub verify_schedule: Vec<Duration>,
    /// Attempts when persisting the updated version list
    pub persist_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            fetch_versions_attempts: 3,
            verify_attempts: 5,
            verify_schedule: [1, 2, 3, 5].into_iter().map(Duration::from_secs).collect(),
            persist_attempts: 3,
        }
    }
}

impl RetryConfig {
    /// Same attempt counts, no waiting (tests and dry runs)
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            verify_schedule: vec![Duration::ZERO],
            ..Self::default()
        }
    }

    pub fn fetch_versions_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.fetch_versions_attempts, self.base_delay)
    }

    pub fn verify_policy(&self) -> RetryPolicy {
        RetryPolicy::with_schedule(self.verify_attempts, self.verify_schedule.clone())
    }

    pub fn persist_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.persist_attempts, self.base_delay)
    }
}

/// Outcome of a retried operation that never succeeded
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
    /// An attempt failed with an error classified as fatal
    Fatal { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal { error, .. } => error,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Fatal { attempt, error } => {
                write!(f, "failed on attempt {}: {}", attempt, error)
            }
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Bounded retry loop with an explicit delay schedule
///
/// `schedule[n]` is the wait after the `n+1`-th failed attempt; when the
/// schedule is shorter than the attempt count its last entry repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub schedule: Vec<Duration>,
}

impl RetryPolicy {
    /// Waits 1x, 2x, 3x ... `base` between attempts
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule: (1..=max_attempts.max(1)).map(|n| base * n).collect(),
        }
    }

    pub fn with_schedule(max_attempts: u32, schedule: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
        }
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.schedule
            .get(idx)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Run `op`, retrying the errors the error type itself considers transient
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, RetryError<E>>
    where
        E: RetryableError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(operation, |e: &E| e.is_retryable(), op)
            .await
    }

    /// Run `op`, retrying whatever `classify` accepts
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        operation: &str,
        classify: C,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        C: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !classify(&error) {
                        warn!("{} failed with a non-retryable error: {}", operation, error);
                        return Err(RetryError::Fatal { attempt, error });
                    }
                    if attempt >= self.max_attempts {
                        warn!(
                            "{} failed after {}/{} attempts: {}",
                            operation, attempt, self.max_attempts, error
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }

                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation, attempt, self.max_attempts, delay, error
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_schedule() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(1));

        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(3));
    }

    #[test]
    fn test_schedule_repeats_last_entry() {
        let policy = RetryConfig::default().verify_policy();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(4), Duration::from_secs(5));
        assert_eq!(policy.delay_after(9), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::linear(3, Duration::ZERO);

        let result = policy
            .execute("flaky read", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(StoreError::Timeout {
                        operation: "read".into(),
                    })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::linear(3, Duration::ZERO);

        let result: Result<(), _> = policy
            .execute("create", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Rejected {
                    status: 400,
                    message: "bad payload".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal { attempt: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_classifier_retries_not_found() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::linear(3, Duration::ZERO);

        let result: Result<(), _> = policy
            .execute_with(
                "read course",
                |e: &StoreError| e.is_retryable() || e.is_not_found(),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::not_found("course c1"))
                },
            )
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.is_not_found());
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
