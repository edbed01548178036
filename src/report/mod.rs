//! Report Generation
//!
//! Orchestrates one report: resolve a key, call the search API through the
//! resilient client, strip reasoning, repair the HTML and merge sources from
//! any earlier research call.

mod sources;

pub use sources::{DEFAULT_SOURCE_TITLE, Source, dedupe_sources};

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ai::{
    BreakerRegistry, ChatRequest, Citation, DebugLog, HtmlFragment, HtmlRepairer, HttpTransport,
    ResilientClient, RetryPolicy, SharedTransport, clean_generated_html, strip_reasoning_blocks,
};
use crate::config::{ApiKeyPool, Config};
use crate::types::Result;

/// Input for one report generation
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub payload: ChatRequest,
    pub policy: RetryPolicy,
    /// Citations gathered by earlier research calls, listed before new ones
    pub prior_citations: Vec<Citation>,
}

impl ReportRequest {
    pub fn new(payload: ChatRequest) -> Self {
        Self {
            payload,
            policy: RetryPolicy::report(),
            prior_citations: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prior_citations(mut self, citations: Vec<Citation>) -> Self {
        self.prior_citations = citations;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub html: HtmlFragment,
    pub sources: Vec<Source>,
}

/// Plain-text research result used to ground a later report call
#[derive(Debug, Clone, Serialize)]
pub struct Research {
    pub content: String,
    pub citations: Vec<Citation>,
}

pub struct ReportService {
    client: ResilientClient,
    keys: ApiKeyPool,
    endpoint: String,
    repairer: HtmlRepairer,
}

impl ReportService {
    pub fn new(
        client: ResilientClient,
        keys: ApiKeyPool,
        endpoint: impl Into<String>,
        repairer: HtmlRepairer,
    ) -> Self {
        Self {
            client,
            keys,
            endpoint: endpoint.into(),
            repairer,
        }
    }

    /// Wire an HTTP-backed service from configuration and the environment
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: SharedTransport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: &Config, transport: SharedTransport) -> Self {
        let mut client = ResilientClient::new(transport)
            .with_breakers(Arc::new(BreakerRegistry::new(
                config.breaker.circuit_breaker_config(),
            )))
            .with_policy(config.retry.policy());
        if config.debug_log.enabled {
            client = client.with_debug_log(Arc::new(DebugLog::new(config.debug_log.capacity)));
        }

        Self::new(
            client,
            ApiKeyPool::from_env(&config.api.api_key_var),
            config.api.endpoint.clone(),
            HtmlRepairer::with_options(config.sanitize.options()),
        )
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Run a research call and return its text and citations
    pub async fn research(
        &self,
        payload: &ChatRequest,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<Research> {
        let key = self.keys.choose()?;
        let response = self
            .client
            .send_with_retry(&self.endpoint, &key, payload, policy, cancel)
            .await?;

        info!(
            chars = response.content.len(),
            sources = response.citations.len(),
            "Research complete"
        );

        Ok(Research {
            content: strip_reasoning_blocks(&response.content),
            citations: response.citations,
        })
    }

    /// Generate one report fragment with deduplicated sources
    pub async fn generate(
        &self,
        request: ReportRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Report> {
        let key = self.keys.choose()?;
        let response = self
            .client
            .send_with_retry(&self.endpoint, &key, &request.payload, &request.policy, cancel)
            .await?;

        let html = clean_generated_html(&response.content, &self.repairer);
        let sources = dedupe_sources(
            request
                .prior_citations
                .into_iter()
                .chain(response.citations),
        );

        info!(
            chars = html.len(),
            sources = sources.len(),
            "Report generated"
        );

        Ok(Report { html, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatMessage, ChatResponse, RequestOutcome, Transport};
    use crate::types::{ReportError, RequestError};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;

    const ENDPOINT: &str = "https://search.test/chat/completions";

    struct FixedTransport {
        outcome: RequestOutcome,
        seen_models: Mutex<Vec<String>>,
    }

    impl FixedTransport {
        fn new(outcome: RequestOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                seen_models: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(
            &self,
            _endpoint: &str,
            _credentials: &SecretString,
            payload: &ChatRequest,
        ) -> RequestOutcome {
            self.seen_models.lock().unwrap().push(payload.model.clone());
            self.outcome.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn service(transport: Arc<FixedTransport>, keys: ApiKeyPool) -> ReportService {
        ReportService::new(
            ResilientClient::new(transport),
            keys,
            ENDPOINT,
            HtmlRepairer::new(),
        )
    }

    fn keys() -> ApiKeyPool {
        ApiKeyPool::new(Some("k".to_string()), vec![])
    }

    fn payload() -> ChatRequest {
        ChatRequest::new("sonar-reasoning-pro").message(ChatMessage::user("report"))
    }

    #[tokio::test]
    async fn test_generate_cleans_html_and_merges_sources() {
        let transport = FixedTransport::new(RequestOutcome::Success(ChatResponse {
            content: "<think>draft</think>\n```html\n<div class=\"section\"><p>x</p>\n```"
                .to_string(),
            citations: vec![
                Citation::Url("https://sec.gov/10k".to_string()),
                Citation::Url("https://news.example".to_string()),
            ],
        }));
        let service = service(transport.clone(), keys());

        let request = ReportRequest::new(payload()).with_prior_citations(vec![Citation::Titled {
            url: "https://sec.gov/10k".to_string(),
            title: Some("Annual report".to_string()),
        }]);
        let report = service.generate(request, None).await.unwrap();

        assert_eq!(report.html.as_str(), "<div class=\"section\"><p>x</p></div>");
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[0].title, "Annual report");
        assert_eq!(report.sources[1].url, "https://news.example");
        assert_eq!(
            *transport.seen_models.lock().unwrap(),
            vec!["sonar-reasoning-pro".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let transport = FixedTransport::new(RequestOutcome::RateLimited);
        let service = service(transport.clone(), ApiKeyPool::new(None, vec![]));

        let err = service
            .generate(ReportRequest::new(payload()), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportError::Request(RequestError::Configuration(_))
        ));
        assert!(transport.seen_models.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_typed() {
        let transport = FixedTransport::new(RequestOutcome::OtherFailure {
            status: Some(401),
            message: "unauthorized".to_string(),
        });
        let service = service(transport, keys());

        let err = service
            .generate(ReportRequest::new(payload()), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportError::Request(RequestError::OtherRequest {
                status: Some(401),
                ..
            })
        ));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_research_strips_reasoning() {
        let transport = FixedTransport::new(RequestOutcome::Success(ChatResponse {
            content: "<think>search plan</think>Revenue grew 12%.".to_string(),
            citations: vec![Citation::Url("https://sec.gov/q".to_string())],
        }));
        let service = service(transport, keys());

        let research = service
            .research(&payload(), &RetryPolicy::default(), None)
            .await
            .unwrap();

        assert_eq!(research.content, "Revenue grew 12%.");
        assert_eq!(research.citations.len(), 1);
    }

    #[test]
    fn test_with_transport_uses_config() {
        let mut config = Config::default();
        config.debug_log.enabled = true;
        config.breaker.failure_threshold = 9;

        let service =
            ReportService::with_transport(&config, FixedTransport::new(RequestOutcome::Timeout));

        assert!(service.client().debug_log().is_some());
        assert_eq!(service.endpoint, config.api.endpoint);
    }
}
