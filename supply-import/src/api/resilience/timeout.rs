//! Request-level time limits
//!
//! A timed-out call surfaces as `StoreError::Timeout`, which the retry
//! policies treat like any other transient network failure.

use std::future::Future;
use std::time::Duration;

use crate::api::StoreError;

/// Request time limits per call class
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Lookups, course reads and creates
    pub read: Duration,
    /// Version-list writes, whose payload grows with the line items
    pub write: Duration,
    /// Document uploads and remote downloads
    pub upload: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(30),
            write: Duration::from_secs(60),
            upload: Duration::from_secs(120),
        }
    }
}

/// Await `fut`, failing with `StoreError::Timeout` once `limit` elapses.
/// A zero limit disables the timeout.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if limit.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation: operation.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_call_becomes_timeout_error() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(10), "slow read", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(StoreError::Timeout {
                operation: "slow read".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_zero_limit_disables_timeout() {
        let result = with_timeout(Duration::ZERO, "read", async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
