//! Circuit Breaker Pattern for Upstream Resilience
//!
//! Sheds load to a failing search API without per-call coordination.
//!
//! ## States
//!
//! - **Closed**: Normal operation, requests flow through
//! - **Open**: Upstream is failing, requests are rejected immediately
//! - **HalfOpen**: One trial request tests whether the upstream recovered
//!
//! ## Transitions
//!
//! ```text
//! Closed --[failure_threshold reached]--> Open
//! Open --[cool-down elapsed]--> HalfOpen
//! HalfOpen --[success]--> Closed
//! HalfOpen --[failure]--> Open
//! ```

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::constants::circuit_breaker as cb_constants;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests flow through
    Closed,
    /// Upstream is failing - requests rejected immediately
    Open,
    /// Testing recovery - one trial request allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,
    /// Time since the last failure before an open circuit admits a trial
    pub cool_down: Duration,
    /// Trial requests admitted while half-open
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: cb_constants::FAILURE_THRESHOLD,
            cool_down: Duration::from_secs(cb_constants::COOL_DOWN_SECS),
            half_open_max_requests: cb_constants::HALF_OPEN_MAX_REQUESTS,
        }
    }
}

/// Unified internal state - all mutable state in single struct
/// to ensure atomicity of state transitions
#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_requests: u32,
    blocked_count: u64,
    total_successes: u64,
    total_failures: u64,
}

impl CircuitBreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            half_open_requests: 0,
            blocked_count: 0,
            total_successes: 0,
            total_failures: 0,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.half_open_requests = 0;
        self.last_failure = None;
    }

    fn cool_down_elapsed(&self, cool_down: Duration) -> bool {
        self.last_failure
            .map(|at| at.elapsed() >= cool_down)
            .unwrap_or(false)
    }
}

/// Thread-safe circuit breaker with unified state management.
///
/// All state is protected by a single RwLock so the failure count and the
/// state transition it triggers can never be observed separately.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    service_name: String,
    inner: RwLock<CircuitBreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service_name", &self.service_name)
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker for a service
    pub fn new(service_name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            service_name: service_name.into(),
            inner: RwLock::new(CircuitBreakerInner::new()),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(service_name: impl Into<String>) -> Self {
        Self::new(service_name, CircuitBreakerConfig::default())
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Current state as last recorded (does not advance Open -> HalfOpen)
    pub fn state(&self) -> CircuitState {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
    }

    /// Check if a request may be issued
    ///
    /// Returns `false` while open and cooling down. Once the cool-down has
    /// elapsed the circuit moves to half-open and admits the trial request;
    /// the caller must report that trial's outcome. Prefer `try_acquire`,
    /// whose permit releases the trial slot if the caller goes away.
    pub fn is_request_allowed(&self) -> bool {
        self.admit().is_some()
    }

    /// Admit a request and return a permit that settles it
    ///
    /// Dropping the permit without recording an outcome releases a half-open
    /// trial slot, so a dropped or timed-out caller cannot wedge the breaker.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.admit().map(|trial| BreakerPermit {
            breaker: Arc::clone(self),
            trial,
            settled: false,
        })
    }

    /// `Some(true)` for a half-open trial, `Some(false)` while closed
    fn admit(&self) -> Option<bool> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::Open => {
                if inner.cool_down_elapsed(self.config.cool_down) {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_requests = 1;

                    tracing::info!(
                        "Circuit breaker [{}]: Transitioning to HALF_OPEN (testing recovery)",
                        self.service_name
                    );
                    Some(true)
                } else {
                    inner.blocked_count += 1;
                    tracing::debug!(
                        "Circuit breaker [{}]: Request blocked (circuit OPEN)",
                        self.service_name
                    );
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.half_open_max_requests {
                    inner.half_open_requests += 1;
                    Some(true)
                } else {
                    inner.blocked_count += 1;
                    tracing::debug!(
                        "Circuit breaker [{}]: Trial request already in flight",
                        self.service_name
                    );
                    None
                }
            }
        }
    }

    /// Record a successful request
    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.total_successes += 1;
        let was = inner.state;
        inner.close();

        if was != CircuitState::Closed {
            tracing::info!(
                "Circuit breaker [{}]: Closed (service recovered)",
                self.service_name
            );
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.total_failures += 1;
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.half_open_requests = 0;

                tracing::warn!(
                    "Circuit breaker [{}]: Re-opened after failed trial request",
                    self.service_name
                );
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;

                tracing::warn!(
                    "Circuit breaker [{}]: Opened after {} failures (cool-down: {:?})",
                    self.service_name,
                    inner.failure_count,
                    self.config.cool_down
                );
            }
            // Already open: the refreshed timestamp extends the cool-down
            _ => {}
        }
    }

    /// Release the half-open trial slot without recording an outcome
    ///
    /// Used when the trial request was abandoned (e.g. cancelled) so the
    /// next caller can run the trial instead.
    pub fn abandon_trial(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_requests = inner.half_open_requests.saturating_sub(1);
        }
    }

    /// Get statistics for monitoring
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        CircuitBreakerStats {
            service_name: self.service_name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            blocked_count: inner.blocked_count,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            since_last_failure: inner.last_failure.map(|t| t.elapsed()),
        }
    }

    /// Force reset to closed state (for manual intervention)
    pub fn reset(&self) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        inner.close();

        tracing::info!(
            "Circuit breaker [{}]: Manually reset to CLOSED",
            self.service_name
        );
    }
}

// =============================================================================
// Permit
// =============================================================================

/// One admitted request against a breaker
///
/// Settle it with `record_success` or `record_failure`. A permit dropped
/// unsettled records nothing and gives a half-open trial slot back.
#[must_use = "dropping the permit abandons the request"]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    /// Whether this permit is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl std::fmt::Debug for BreakerPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerPermit")
            .field("service_name", &self.breaker.service_name)
            .field("trial", &self.trial)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.abandon_trial();
            tracing::debug!(
                "Circuit breaker [{}]: Trial request abandoned",
                self.breaker.service_name
            );
        }
    }
}

/// Statistics for monitoring circuit breaker state
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub service_name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub blocked_count: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub since_last_failure: Option<Duration>,
}

impl CircuitBreakerStats {
    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let time_str = self
            .since_last_failure
            .map(|d| format!(" last failure {:.1}s ago", d.as_secs_f64()))
            .unwrap_or_default();

        format!(
            "[{}] {} | failures={} blocked={} successes_total={} failures_total={}{}",
            self.service_name,
            self.state,
            self.failure_count,
            self.blocked_count,
            self.total_successes,
            self.total_failures,
            time_str
        )
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One circuit breaker per external-service identity
///
/// Breakers are created lazily and live as long as the registry.
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `service`, created on first use
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone())))
            .clone()
    }

    /// Stats for every breaker created so far
    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| entry.value().stats())
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            cool_down: Duration::from_millis(1),
            half_open_max_requests: 1,
        }
    }

    #[test]
    fn test_initial_state_is_closed() {
        let cb = CircuitBreaker::with_defaults("test");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_request_allowed());
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let cb = CircuitBreaker::with_defaults("test");

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_request_allowed());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_request_allowed());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::with_defaults("test");

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.stats().failure_count, 0);

        cb.record_failure();
        cb.record_failure();
        // Still closed because success reset the count
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stays_open_until_cool_down() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            cool_down: Duration::from_secs(60),
            half_open_max_requests: 1,
        };
        let cb = CircuitBreaker::new("test", config);

        cb.record_failure();
        for _ in 0..5 {
            assert!(!cb.is_request_allowed());
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().blocked_count, 5);
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let cb = CircuitBreaker::new("test", fast_config(1));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));

        assert!(cb.is_request_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Trial still in flight
        assert!(!cb.is_request_allowed());
        assert!(!cb.is_request_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_closes_on_success() {
        let cb = CircuitBreaker::new("test", fast_config(1));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.is_request_allowed());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_count, 0);
        assert!(cb.is_request_allowed());
    }

    #[test]
    fn test_half_open_opens_on_failure() {
        let cb = CircuitBreaker::new("test", fast_config(3));

        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.is_request_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // A single failed trial is enough, regardless of threshold
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_abandoned_trial_frees_slot() {
        let cb = CircuitBreaker::new("test", fast_config(1));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(cb.is_request_allowed());
        assert!(!cb.is_request_allowed());

        cb.abandon_trial();
        assert!(cb.is_request_allowed());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_dropped_trial_permit_frees_slot() {
        let cb = Arc::new(CircuitBreaker::new("test", fast_config(1)));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));

        let permit = cb.try_acquire().unwrap();
        assert!(permit.is_trial());
        assert!(cb.try_acquire().is_none());

        drop(permit);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let retry = cb.try_acquire().unwrap();
        retry.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_settled_permit_does_not_release_slot() {
        let cb = Arc::new(CircuitBreaker::new("test", fast_config(1)));

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(10));

        cb.try_acquire().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.stats().total_failures, 2);
    }

    #[test]
    fn test_closed_permit_drop_records_nothing() {
        let cb = Arc::new(CircuitBreaker::with_defaults("test"));

        let permit = cb.try_acquire().unwrap();
        assert!(!permit.is_trial());
        drop(permit);

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.total_successes, 0);
    }

    #[test]
    fn test_manual_reset() {
        let cb = CircuitBreaker::new("test", fast_config(1));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_request_allowed());
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1000,
            ..Default::default()
        };
        let cb = Arc::new(CircuitBreaker::new("test", config));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = Arc::clone(&cb);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cb.record_failure();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cb.stats();
        assert_eq!(stats.failure_count, 800);
        assert_eq!(stats.total_failures, 800);
        assert_eq!(stats.state, CircuitState::Closed);
    }

    #[test]
    fn test_registry_shares_breaker_per_service() {
        let registry = BreakerRegistry::new(fast_config(1));

        registry.get("a").record_failure();
        assert_eq!(registry.get("a").state(), CircuitState::Open);
        assert_eq!(registry.get("b").state(), CircuitState::Closed);
        assert_eq!(registry.stats().len(), 2);
    }

    #[test]
    fn test_stats_summary() {
        let cb = CircuitBreaker::with_defaults("search");
        cb.record_success();
        let summary = cb.stats().summary();
        assert!(summary.contains("[search] CLOSED"));
        assert!(summary.contains("successes_total=1"));
    }
}
