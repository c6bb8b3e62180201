//! Search provider abstraction.
//!
//! A search turns a keyword query, scoped to one country, into an ordered list
//! of result links. Only the `link` of each result is consumed downstream.

mod serper;

pub use serper::SerperClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchResult;

/// One bounded, country-scoped search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    /// Keyword query.
    pub query: String,
    /// Country the results are geolocated to.
    pub country: String,
    /// Maximum number of results.
    pub result_count: u32,
}

/// A ranked search result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

impl SearchResult {
    /// The link, when present and not blank.
    pub fn usable_link(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Keyword search collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search. Results keep the provider's ranking order.
    ///
    /// Non-success statuses and unparseable bodies are hard failures.
    async fn search(&self, query: &SearchQuery) -> ResearchResult<Vec<SearchResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_link() {
        let mut result = SearchResult {
            link: Some(" https://a.example ".to_string()),
            ..SearchResult::default()
        };
        assert_eq!(result.usable_link(), Some("https://a.example"));

        result.link = Some("   ".to_string());
        assert_eq!(result.usable_link(), None);

        result.link = None;
        assert_eq!(result.usable_link(), None);
    }
}
