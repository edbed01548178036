//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Request Errors
//!
//! - **Configuration**: missing credentials (fail fast, never retried)
//! - **CircuitOpen**: upstream shed locally (retry later)
//! - **RateLimitExceeded / TimeoutExceeded**: transient, retries exhausted
//! - **OtherRequest**: non-transient HTTP or network failure (not retried)
//! - **Cancelled**: caller abandoned the request
//!
//! The HTML repair pass never surfaces errors; it logs and degrades.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Request Error
// =============================================================================

/// Terminal outcome of a logical request to the search API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service '{service}' temporarily unavailable (circuit breaker open), retry later")]
    CircuitOpen { service: String },

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Request timeout after {attempts} attempts")]
    TimeoutExceeded { attempts: u32 },

    #[error("Request failed{}: {message}", status_suffix(.status))]
    OtherRequest {
        status: Option<u16>,
        message: String,
    },

    #[error("Request cancelled")]
    Cancelled,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl RequestError {
    /// Whether the caller may simply re-invoke the same request later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. }
                | Self::RateLimitExceeded { .. }
                | Self::TimeoutExceeded { .. }
                | Self::Cancelled
        )
    }

    /// Short machine-readable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::TimeoutExceeded { .. } => "TIMEOUT_EXCEEDED",
            Self::OtherRequest { .. } => "OTHER",
            Self::Cancelled => "CANCELLED",
        }
    }
}

// =============================================================================
// Fragment Error
// =============================================================================

/// Raised when a string does not satisfy the HTML fragment invariant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed HTML fragment: {}", .issues.join("; "))]
pub struct FragmentError {
    pub issues: Vec<String>,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ReportError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Fragment(#[from] FragmentError),

    #[error("Config error: {0}")]
    Config(String),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },
}

impl ReportError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Check if this error is recoverable by re-invoking later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Request(err) => err.is_recoverable(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias using ReportError
pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_request_display_includes_status() {
        let err = RequestError::OtherRequest {
            status: Some(500),
            message: "internal".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed (500): internal");

        let err = RequestError::OtherRequest {
            status: None,
            message: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed: connection reset");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(RequestError::RateLimitExceeded { attempts: 3 }.is_recoverable());
        assert!(RequestError::TimeoutExceeded { attempts: 3 }.is_recoverable());
        assert!(
            RequestError::CircuitOpen {
                service: "api".to_string()
            }
            .is_recoverable()
        );
        assert!(!RequestError::Configuration("missing key".to_string()).is_recoverable());
        assert!(
            !RequestError::OtherRequest {
                status: Some(400),
                message: "bad".to_string()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_report_error_wraps_request_error() {
        let err: ReportError = RequestError::Cancelled.into();
        assert!(matches!(err, ReportError::Request(RequestError::Cancelled)));
        assert!(err.is_recoverable());
        assert!(!ReportError::Config("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_fragment_error_lists_issues() {
        let err = FragmentError {
            issues: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Malformed HTML fragment: a; b");
    }
}
