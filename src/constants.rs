//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Retry policy constants
pub mod retry {
    /// Default maximum attempts per logical request
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Attempts used by the deep-research and report call sites
    pub const REPORT_MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 1000;

    /// Maximum delay between retries, before jitter (seconds)
    pub const MAX_DELAY_SECS: u64 = 60;

    /// Upper bound (exclusive) of the uniform jitter added to each delay (milliseconds)
    pub const JITTER_MAX_MS: u64 = 1000;
}

/// Circuit breaker constants
pub mod circuit_breaker {
    /// Number of failures before opening circuit
    pub const FAILURE_THRESHOLD: u32 = 3;

    /// Duration to wait before attempting recovery (seconds)
    pub const COOL_DOWN_SECS: u64 = 60;

    /// Trial requests allowed in half-open state
    pub const HALF_OPEN_MAX_REQUESTS: u32 = 1;
}

/// HTML repair constants
pub mod sanitize {
    /// Class of the wrapper every section of a report starts with
    pub const ROOT_CLASS: &str = "section";

    /// Class of the outer container the rendering layer adds itself
    pub const WRAPPER_CLASS: &str = "report-container";

    /// Structural element balanced by the repair pass
    pub const CONTAINER_TAG: &str = "div";

    /// Upper bound on repair passes; stops early once output is stable
    pub const MAX_REPAIR_PASSES: usize = 16;

    /// Characters shown in diagnostic previews
    pub const PREVIEW_CHARS: usize = 120;
}

/// Debug capture constants
pub mod debug_log {
    /// Request/response pairs kept for operator inspection
    pub const DEFAULT_CAPACITY: usize = 20;
}

/// HTTP/Network constants
pub mod network {
    /// Chat completions endpoint of the search API
    pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

    /// Default per-attempt request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Timeout for reasoning and deep-research models (seconds)
    pub const REPORT_TIMEOUT_SECS: u64 = 180;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Credential environment variables
pub mod env {
    /// Primary API key variable; numbered pool uses `<NAME>_1..N`
    pub const API_KEY_VAR: &str = "PERPLEXITY_API_KEY";

    /// Enables verbose stage logging in the HTML repair pass
    pub const DEBUG_HTML_VAR: &str = "DEBUG_HTML";

    /// Prefix for configuration overrides
    pub const CONFIG_PREFIX: &str = "FINREPORT_";
}
