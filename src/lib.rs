//! finreport - Resilient Search Client and HTML Repair for Financial Reports
//!
//! Calls an LLM-backed web-search API to produce sections of equity research
//! reports, surviving rate limits and outages, and repairs the HTML the model
//! returns before it reaches a renderer.
//!
//! ## Core Features
//!
//! - **Retry with Backoff**: exponential delay plus jitter for rate limits and timeouts
//! - **Circuit Breaker**: per-service fail-fast after repeated failures
//! - **Cancellation**: pending retries stop on a cancellation token
//! - **HTML Repair**: fence removal, container unwrapping and tag balancing
//! - **Key Pool**: primary API key or a numbered pool chosen at random
//!
//! ## Quick Start
//!
//! ```ignore
//! use finreport::{ChatMessage, ChatRequest, Config, ReportRequest, ReportService};
//!
//! let config = Config::default();
//! let service = ReportService::from_config(&config)?;
//! let payload = ChatRequest::new("sonar-reasoning-pro")
//!     .message(ChatMessage::user("Write the valuation section for ACME"));
//! let report = service.generate(ReportRequest::new(payload), None).await?;
//! println!("{}", report.html);
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: transport, retry, circuit breaker, HTML repair
//! - [`config`]: layered configuration and API key resolution
//! - [`report`]: report generation and source handling
//! - [`cli`]: command implementations

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod report;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{ApiKeyPool, Config, ConfigLoader};

// Error Types
pub use types::error::{FragmentError, ReportError, RequestError, Result};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    // Circuit breaker
    BreakerRegistry,
    // Transport
    ChatMessage,
    ChatRequest,
    ChatResponse,
    Citation,
    CircuitBreaker,
    CircuitBreakerConfig,
    CircuitState,
    // HTML repair
    HtmlFragment,
    HtmlRepairer,
    HttpTransport,
    RequestOutcome,
    // Retry
    ResilientClient,
    RetryPolicy,
    SanitizeOptions,
    Transport,
    sanitize,
};

// =============================================================================
// Report Re-exports
// =============================================================================

pub use report::{Report, ReportRequest, ReportService, Source};
