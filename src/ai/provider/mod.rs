//! Search API Client
//!
//! Defines the `Transport` trait (one HTTP exchange) and the typed payloads
//! that cross it. Resilience lives one layer up in `ResilientClient`.
//!
//! ## Modules
//!
//! - `circuit_breaker`: Circuit breaker pattern for upstream resilience
//! - `debug_log`: Bounded capture of recent request/response pairs
//! - `perplexity`: reqwest-backed transport for the chat completions API
//! - `retry`: Bounded retry with exponential backoff and jitter

mod circuit_breaker;
mod debug_log;
mod perplexity;
mod retry;

pub use circuit_breaker::{
    BreakerPermit, BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    CircuitState,
};
pub use debug_log::{DebugEntry, DebugLog};
pub use perplexity::HttpTransport;
pub use retry::{ResilientClient, RetryPolicy};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Request Payload
// =============================================================================

/// One message of the conversation sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchOptions {
    /// `low`, `medium` or `high`
    pub search_context_size: String,
}

/// Chat completions request body
///
/// Unset options are omitted from the serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_after_date_filter: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_images: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub return_related_questions: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            search_mode: None,
            search_after_date_filter: None,
            return_images: false,
            return_related_questions: false,
            web_search_options: None,
        }
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn search_mode(mut self, mode: impl Into<String>) -> Self {
        self.search_mode = Some(mode.into());
        self
    }

    /// Restrict search results to content published after `date` (`M/D/YYYY`)
    pub fn search_after(mut self, date: impl Into<String>) -> Self {
        self.search_after_date_filter = Some(date.into());
        self
    }

    pub fn return_images(mut self, enabled: bool) -> Self {
        self.return_images = enabled;
        self
    }

    pub fn return_related_questions(mut self, enabled: bool) -> Self {
        self.return_related_questions = enabled;
        self
    }

    pub fn search_context_size(mut self, size: impl Into<String>) -> Self {
        self.web_search_options = Some(WebSearchOptions {
            search_context_size: size.into(),
        });
        self
    }

    /// First user-visible prompt, used for debug capture
    pub fn first_prompt(&self) -> Option<&str> {
        self.messages.first().map(|m| m.content.as_str())
    }
}

// =============================================================================
// Response
// =============================================================================

/// Citation as returned by the API: a bare URL or an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Citation {
    Url(String),
    Titled {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl Citation {
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Titled { url, .. } => url,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::Titled { title, .. } => title.as_deref(),
        }
    }

    /// Lenient conversion of one raw citation entry
    ///
    /// Accepts a string or an object with a string `url`; anything else
    /// (null, numbers, objects without a url) yields `None`.
    fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(url) => Some(Self::Url(url)),
            serde_json::Value::Object(mut fields) => {
                let url = match fields.remove("url") {
                    Some(serde_json::Value::String(url)) => url,
                    _ => return None,
                };
                let title = match fields.remove("title") {
                    Some(serde_json::Value::String(title)) => Some(title),
                    _ => None,
                };
                Some(Self::Titled { url, title })
            }
            _ => None,
        }
    }
}

/// Typed view of a successful response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// `choices[0].message.content`
    pub content: String,
    pub citations: Vec<Citation>,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    citations: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// Parse a response body; missing content is an error, missing citations are not
    pub fn from_json(body: &str) -> Result<Self, String> {
        let raw: RawResponse =
            serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {}", e))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "No content in response".to_string())?;

        let citations = raw
            .citations
            .unwrap_or_default()
            .into_iter()
            .filter_map(Citation::from_value)
            .collect();

        Ok(Self { content, citations })
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success(ChatResponse),
    RateLimited,
    Timeout,
    OtherFailure {
        status: Option<u16>,
        message: String,
    },
}

impl RequestOutcome {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::OtherFailure { .. } => "other_failure",
        }
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// One request/response exchange with the search API
///
/// Implementations classify the raw result; they never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        credentials: &SecretString,
        payload: &ChatRequest,
    ) -> RequestOutcome;

    fn name(&self) -> &str;
}

/// Thread-safe shared transport
pub type SharedTransport = Arc<dyn Transport>;
