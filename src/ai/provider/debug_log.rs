//! Bounded capture of recent request/response pairs for operators.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ChatRequest, ChatResponse, Citation};
use crate::constants::debug_log as log_constants;

#[derive(Debug, Clone, Serialize)]
pub struct DebugEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub search_mode: Option<String>,
    pub date_filter: Option<String>,
    pub prompt: Option<String>,
    pub response: String,
    pub citations: Vec<Citation>,
}

impl DebugEntry {
    pub fn new(request: &ChatRequest, response: &ChatResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model: request.model.clone(),
            search_mode: request.search_mode.clone(),
            date_filter: request.search_after_date_filter.clone(),
            prompt: request.first_prompt().map(str::to_string),
            response: response.content.clone(),
            citations: response.citations.clone(),
        }
    }
}

/// Ring buffer of the last `capacity` entries, oldest evicted first
#[derive(Debug)]
pub struct DebugLog {
    capacity: usize,
    entries: Mutex<VecDeque<DebugEntry>>,
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, request: &ChatRequest, response: &ChatResponse) {
        let entry = DebugEntry::new(request, response);
        tracing::debug!(id = %entry.id, model = %entry.model, "Captured API call");

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot, oldest first
    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new(log_constants::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ChatMessage;

    fn response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            citations: vec![Citation::Url("https://a.example".to_string())],
        }
    }

    #[test]
    fn test_records_request_fields() {
        let log = DebugLog::default();
        let request = ChatRequest::new("sonar")
            .message(ChatMessage::user("what happened?"))
            .search_mode("sec")
            .search_after("3/1/2025");

        log.record(&request, &response("answer"));

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].model, "sonar");
        assert_eq!(entries[0].search_mode.as_deref(), Some("sec"));
        assert_eq!(entries[0].date_filter.as_deref(), Some("3/1/2025"));
        assert_eq!(entries[0].prompt.as_deref(), Some("what happened?"));
        assert_eq!(entries[0].citations.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let log = DebugLog::new(2);
        let request = ChatRequest::new("sonar");

        log.record(&request, &response("one"));
        log.record(&request, &response("two"));
        log.record(&request, &response("three"));

        let contents: Vec<_> = log.entries().into_iter().map(|e| e.response).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }
}
