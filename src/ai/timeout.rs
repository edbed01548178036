//! Per-Attempt Deadlines
//!
//! Wraps an async operation so an elapsed deadline surfaces as
//! `ReportError::Timeout` naming the operation.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout_map;
//!
//! let outcome = with_timeout_map(
//!     policy.timeout,
//!     transport.send(endpoint, key, payload),
//!     "search request"
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{ReportError, Result};

/// Execute an async operation with a timeout, wrapping its output in `Ok`
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(ReportError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_map_success() {
        let result = with_timeout_map(Duration::from_secs(1), async { 42 }, "fast").await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_map_expires() {
        let result = with_timeout_map(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(5)),
            "sleep",
        )
        .await;
        match result {
            Err(ReportError::Timeout { operation, duration }) => {
                assert_eq!(operation, "sleep");
                assert_eq!(duration, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
