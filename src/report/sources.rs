//! Citation normalisation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ai::Citation;

/// Title given to citations that arrive as bare URLs
pub const DEFAULT_SOURCE_TITLE: &str = "Source";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
}

impl From<Citation> for Source {
    fn from(citation: Citation) -> Self {
        match citation {
            Citation::Url(url) => Self {
                url: url.trim().to_string(),
                title: DEFAULT_SOURCE_TITLE.to_string(),
            },
            Citation::Titled { url, title } => Self {
                url: url.trim().to_string(),
                title: title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
            },
        }
    }
}

/// Normalise citations and drop blank or repeated URLs (first occurrence wins)
pub fn dedupe_sources(citations: impl IntoIterator<Item = Citation>) -> Vec<Source> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .map(Source::from)
        .filter(|source| !source.url.is_empty() && seen.insert(source.url.clone()))
        .collect()
}
