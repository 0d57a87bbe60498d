//! Timeout helpers
//!
//! Wall-clock bounds for operations that can hang on the network: git
//! clone/fetch/pull/push and GitHub API calls. The agent loop itself is
//! bounded by its step counter, not by a timer.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let output = with_timeout(
//!     Duration::from_secs(600),
//!     async { run_git(&["pull"]).await },
//!     "git pull",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{Result, WikiError};

/// Execute an async operation with a timeout
///
/// Returns [`WikiError::Timeout`] if the operation does not complete within
/// `timeout`. The inner future is dropped on expiry.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(WikiError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, WikiError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, WikiError>(42)
            },
            "git clone",
        )
        .await;
        match result {
            Err(WikiError::Timeout { operation, .. }) => assert_eq!(operation, "git clone"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_propagates_inner_error() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(WikiError::git("push", "rejected")) },
            "git push",
        )
        .await;
        assert!(matches!(result, Err(WikiError::Git { .. })));
    }
}
