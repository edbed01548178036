//! Perplexity-compatible Chat Completions Transport
//!
//! Performs exactly one POST per call and classifies the result into a
//! `RequestOutcome`. Retry and circuit breaking are the caller's concern.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

use super::{ChatRequest, ChatResponse, RequestOutcome, Transport};
use crate::constants::network as net_constants;
use crate::types::{ReportError, Result};

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Transport without a client-side request deadline
    ///
    /// `ResilientClient` applies the per-attempt timeout from its policy.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Transport whose client aborts any request running longer than `timeout`
    pub fn with_request_timeout(timeout: Duration) -> Result<Self> {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(
            net_constants::CONNECTION_TIMEOUT_SECS,
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ReportError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        credentials: &SecretString,
        payload: &ChatRequest,
    ) -> RequestOutcome {
        debug!(model = %payload.model, endpoint, "Sending search request");

        let response = match self
            .client
            .post(endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", credentials.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return classify_error(&err),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RequestOutcome::RateLimited;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return classify_error(&err),
        };

        if status != reqwest::StatusCode::OK {
            return RequestOutcome::OtherFailure {
                status: Some(status.as_u16()),
                message: body,
            };
        }

        match ChatResponse::from_json(&body) {
            Ok(parsed) => RequestOutcome::Success(parsed),
            Err(message) => RequestOutcome::OtherFailure {
                status: Some(status.as_u16()),
                message,
            },
        }
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

fn classify_error(err: &reqwest::Error) -> RequestOutcome {
    if err.is_timeout() {
        return RequestOutcome::Timeout;
    }
    classify_message(&err.to_string(), err.status().map(|s| s.as_u16()))
}

/// Network errors that mention rate limiting are treated as rate limits
fn classify_message(message: &str, status: Option<u16>) -> RequestOutcome {
    let lower = message.to_lowercase();
    if lower.contains("rate") || lower.contains("429") {
        RequestOutcome::RateLimited
    } else {
        RequestOutcome::OtherFailure {
            status,
            message: message.to_string(),
        }
    }
}
