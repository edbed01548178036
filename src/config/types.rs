//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/finreport/) and project (.finreport/) level configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::provider::{CircuitBreakerConfig, RetryPolicy};
use crate::ai::validation::SanitizeOptions;
use crate::constants::{
    circuit_breaker as cb_constants, debug_log as log_constants, network as net_constants,
    retry as retry_constants, sanitize as sanitize_constants,
};
use crate::types::{ReportError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Search API settings
    pub api: ApiConfig,

    /// Retry policy for transient failures
    pub retry: RetryConfig,

    /// Circuit breaker settings
    pub breaker: BreakerConfig,

    /// HTML repair settings
    pub sanitize: SanitizeConfig,

    /// Request/response capture for operators
    pub debug_log: DebugLogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            sanitize: SanitizeConfig::default(),
            debug_log: DebugLogConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ReportError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.api.endpoint).is_err() {
            return Err(ReportError::Config(format!(
                "api.endpoint is not a valid URL: {}",
                self.api.endpoint
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ReportError::Config(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.retry.timeout_secs == 0 {
            return Err(ReportError::Config(
                "retry.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ReportError::Config(
                "breaker.failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.sanitize.container_tag.trim().is_empty() {
            return Err(ReportError::Config(
                "sanitize.container_tag must not be empty".to_string(),
            ));
        }

        if self.debug_log.enabled && self.debug_log.capacity == 0 {
            return Err(ReportError::Config(
                "debug_log.capacity must be greater than 0 when enabled".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// API Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Chat completions endpoint
    pub endpoint: String,

    /// Default model identifier
    pub model: String,

    /// Environment variable holding the API key (pool uses `<VAR>_1..N`)
    pub api_key_var: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: net_constants::DEFAULT_ENDPOINT.to_string(),
            model: "sonar-reasoning-pro".to_string(),
            api_key_var: crate::constants::env::API_KEY_VAR.to_string(),
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per logical request
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds
    pub base_delay_ms: u64,

    /// Cap on the exponential component in seconds
    pub max_delay_secs: u64,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            max_delay_secs: retry_constants::MAX_DELAY_SECS,
            timeout_secs: net_constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

// =============================================================================
// Circuit Breaker Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial request
    pub cool_down_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_constants::FAILURE_THRESHOLD,
            cool_down_secs: cb_constants::COOL_DOWN_SECS,
        }
    }
}

impl BreakerConfig {
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cool_down: Duration::from_secs(self.cool_down_secs),
            ..Default::default()
        }
    }
}

// =============================================================================
// Sanitize Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Class the fragment is expected to start with
    pub root_class: String,

    /// Class of the redundant outer wrapper to strip
    pub wrapper_class: String,

    /// Element whose tags are balanced
    pub container_tag: String,

    /// Verbose stage logging (also enabled by DEBUG_HTML)
    pub debug: bool,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            root_class: sanitize_constants::ROOT_CLASS.to_string(),
            wrapper_class: sanitize_constants::WRAPPER_CLASS.to_string(),
            container_tag: sanitize_constants::CONTAINER_TAG.to_string(),
            debug: false,
        }
    }
}

impl SanitizeConfig {
    pub fn options(&self) -> SanitizeOptions {
        SanitizeOptions {
            root_class: self.root_class.clone(),
            wrapper_class: self.wrapper_class.clone(),
            container_tag: self.container_tag.clone(),
            verbose: self.debug,
        }
    }
}

// =============================================================================
// Debug Log Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugLogConfig {
    /// Capture request/response pairs
    pub enabled: bool,

    /// Pairs retained, oldest evicted first
    pub capacity: usize,
}

impl Default for DebugLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: log_constants::DEFAULT_CAPACITY,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
