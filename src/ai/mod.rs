//! AI Integration Layer
//!
//! Resilient access to the LLM-backed search API and repair of the HTML it
//! returns.

pub mod provider;
pub mod timeout;
pub mod validation;

pub use provider::{
    BreakerPermit, BreakerRegistry, ChatMessage, ChatRequest, ChatResponse, Citation,
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, DebugEntry, DebugLog,
    HttpTransport, RequestOutcome, ResilientClient, RetryPolicy, SharedTransport, Transport,
    WebSearchOptions,
};
pub use timeout::with_timeout_map;
pub use validation::{
    FragmentIssue, HtmlFragment, HtmlRepairer, SanitizeOptions, clean_generated_html, sanitize,
    strip_reasoning_blocks,
};
