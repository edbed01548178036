//! Resilient Request Client
//!
//! Wraps a `Transport` with:
//! - Bounded retry of transient outcomes (rate limited, timed out)
//! - Exponential backoff with uniform jitter between attempts
//! - One circuit breaker per endpoint, consulted once per logical request
//! - Optional capture of successful exchanges into a `DebugLog`
//!
//! Backoff sleeps suspend only the calling task and can be cancelled.

use rand::Rng;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    BreakerRegistry, ChatRequest, ChatResponse, DebugLog, RequestOutcome, SharedTransport,
};
use crate::ai::timeout::with_timeout_map;
use crate::config::is_blank;
use crate::constants::{network as net_constants, retry as retry_constants};
use crate::types::RequestError;

// =============================================================================
// Retry Policy
// =============================================================================

/// Per-call retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per logical request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for each subsequent one
    pub base_delay: Duration,
    /// Cap on the exponential component (jitter is added on top)
    pub max_delay: Duration,
    /// Deadline for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            timeout: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    /// Policy used for reasoning and deep-research report calls
    pub fn report() -> Self {
        Self {
            max_attempts: retry_constants::REPORT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(net_constants::REPORT_TIMEOUT_SECS),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `min(base_delay * 2^attempt, max_delay)`, without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Full delay before the retry following `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + random_jitter()
    }
}

/// Uniform jitter in `[0, JITTER_MAX_MS)` milliseconds
fn random_jitter() -> Duration {
    let jitter_ms = rand::rng().random_range(0..retry_constants::JITTER_MAX_MS);
    Duration::from_millis(jitter_ms)
}

// =============================================================================
// Resilient Client
// =============================================================================

pub struct ResilientClient {
    transport: SharedTransport,
    breakers: Arc<BreakerRegistry>,
    debug_log: Option<Arc<DebugLog>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("transport", &self.transport.name())
            .field("policy", &self.policy)
            .field("debug_log", &self.debug_log.is_some())
            .finish()
    }
}

impl ResilientClient {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            breakers: Arc::new(BreakerRegistry::default()),
            debug_log: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Share breakers with other clients talking to the same endpoints
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn with_debug_log(mut self, debug_log: Arc<DebugLog>) -> Self {
        self.debug_log = Some(debug_log);
        self
    }

    /// Policy used by `send`
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn debug_log(&self) -> Option<&DebugLog> {
        self.debug_log.as_deref()
    }

    /// `send_with_retry` with the client's default policy
    pub async fn send(
        &self,
        endpoint: &str,
        credentials: &SecretString,
        payload: &ChatRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<ChatResponse, RequestError> {
        self.send_with_retry(endpoint, credentials, payload, &self.policy, cancel)
            .await
    }

    /// Issue one logical request, retrying transient outcomes
    ///
    /// Blank credentials and an open circuit fail before any network call.
    /// Exhausted retries and non-transient failures each record exactly one
    /// failure on the endpoint's breaker; cancellation records nothing.
    pub async fn send_with_retry(
        &self,
        endpoint: &str,
        credentials: &SecretString,
        payload: &ChatRequest,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<ChatResponse, RequestError> {
        if is_blank(credentials) {
            return Err(RequestError::Configuration(
                "API key is empty".to_string(),
            ));
        }

        // Dropping the permit (cancel, or the caller dropping this future)
        // hands a half-open trial slot back to the breaker
        let breaker = self.breakers.get(endpoint);
        let Some(permit) = breaker.try_acquire() else {
            return Err(RequestError::CircuitOpen {
                service: endpoint.to_string(),
            });
        };

        let max_attempts = policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            if is_cancelled(cancel) {
                return Err(RequestError::Cancelled);
            }

            debug!(
                attempt = attempt + 1,
                max_attempts,
                transport = self.transport.name(),
                model = %payload.model,
                "Search attempt"
            );

            let call = with_timeout_map(
                policy.timeout,
                self.transport.send(endpoint, credentials, payload),
                "search request",
            );
            let outcome = tokio::select! {
                result = call => result.unwrap_or(RequestOutcome::Timeout),
                _ = wait_cancelled(cancel) => return Err(RequestError::Cancelled),
            };

            match outcome {
                RequestOutcome::Success(response) => {
                    if let Some(log) = &self.debug_log {
                        log.record(payload, &response);
                    }
                    permit.record_success();

                    info!(attempts = attempt + 1, "Search request succeeded");
                    return Ok(response);
                }
                RequestOutcome::OtherFailure { status, message } => {
                    permit.record_failure();
                    warn!(?status, error = %message, "Search request failed");
                    return Err(RequestError::OtherRequest { status, message });
                }
                transient => {
                    if attempt + 1 >= max_attempts {
                        permit.record_failure();
                        warn!(
                            attempts = max_attempts,
                            outcome = transient.label(),
                            "Retries exhausted"
                        );
                        return Err(match transient {
                            RequestOutcome::RateLimited => RequestError::RateLimitExceeded {
                                attempts: max_attempts,
                            },
                            _ => RequestError::TimeoutExceeded {
                                attempts: max_attempts,
                            },
                        });
                    }

                    let delay = policy.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        outcome = transient.label(),
                        "Transient failure, retrying after backoff"
                    );

                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = wait_cancelled(cancel) => return Err(RequestError::Cancelled),
                    }
                }
            }
        }

        // Unreachable with max_attempts >= 1; the last attempt always returns
        Err(RequestError::Cancelled)
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(CancellationToken::is_cancelled)
}

/// Resolves when `cancel` fires; never resolves without a token
async fn wait_cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
