//! Ask Command
//!
//! Generate one report fragment from a prompt, optionally grounded by a
//! research call whose sources are merged into the report's.
//!
//! Usage:
//!   finreport ask [--model M] [--research-model M] [--max-retries N]
//!                 [--timeout SECS] [--search-mode MODE] [--search-after DATE]
//!                 [-f json] PROMPT

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ai::{ChatMessage, ChatRequest, RetryPolicy};
use crate::cli::Output;
use crate::config::Config;
use crate::report::{ReportRequest, ReportService};
use crate::types::Result;

#[derive(Debug, Clone, Default)]
pub struct AskArgs {
    pub prompt: String,
    pub model: Option<String>,
    /// Model for a research call made before the report call
    pub research_model: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub search_mode: Option<String>,
    pub search_after: Option<String>,
    pub format: String,
}

impl AskArgs {
    fn report_model(&self, config: &Config) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| config.api.model.clone())
    }

    /// Request for `model`; research findings, when present, go in a system message
    fn payload(&self, model: impl Into<String>, findings: Option<&str>) -> ChatRequest {
        let mut payload = ChatRequest::new(model);
        if let Some(findings) = findings {
            payload = payload.message(ChatMessage::system(format!(
                "Ground the report in these research findings:\n\n{}",
                findings
            )));
        }
        payload = payload.message(ChatMessage::user(&self.prompt));

        if let Some(mode) = &self.search_mode {
            payload = payload.search_mode(mode);
        }
        if let Some(date) = &self.search_after {
            payload = payload.search_after(date);
        }
        payload
    }

    fn policy(&self, config: &Config) -> RetryPolicy {
        let mut policy = config.retry.policy();
        if let Some(attempts) = self.max_retries {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(secs) = self.timeout_secs {
            policy = policy.with_timeout(Duration::from_secs(secs));
        }
        policy
    }
}

/// Run one report generation; Ctrl-C cancels pending retries
pub async fn run(args: AskArgs, config: &Config, output: &Output) -> Result<()> {
    let service = ReportService::from_config(config)?;
    let policy = args.policy(config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let request = match &args.research_model {
        Some(research_model) => {
            output.info(&format!("Researching with {}", research_model));
            let research = service
                .research(&args.payload(research_model, None), &policy, Some(&cancel))
                .await?;
            ReportRequest::new(args.payload(args.report_model(config), Some(&research.content)))
                .with_prior_citations(research.citations)
        }
        None => ReportRequest::new(args.payload(args.report_model(config), None)),
    }
    .with_policy(policy);

    output.info(&format!("Requesting report from {}", config.api.endpoint));
    let report = service.generate(request, Some(&cancel)).await?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.html);
        output.sources(&report.sources);
    }

    for stats in service.client().breakers().stats() {
        tracing::debug!("{}", stats.summary());
    }

    Ok(())
}
