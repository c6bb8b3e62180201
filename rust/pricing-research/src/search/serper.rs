// Serper (Google Search) client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{SearchProvider, SearchQuery, SearchResult};
use crate::error::{ResearchError, ResearchResult, Stage};

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default, alias = "results")]
    organic: Vec<SearchResult>,
}

/// Serper search API client.
#[derive(Debug, Clone)]
pub struct SerperClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl SerperClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
            client,
        }
    }

    fn parse_body(query: &str, body: &str) -> ResearchResult<Vec<SearchResult>> {
        let data: SerperResponse = serde_json::from_str(body).map_err(|e| {
            ResearchError::upstream(
                Stage::Search,
                query,
                format!("unable to parse search response: {e}"),
            )
        })?;
        Ok(data.organic)
    }
}

#[async_trait]
impl SearchProvider for SerperClient {
    async fn search(&self, query: &SearchQuery) -> ResearchResult<Vec<SearchResult>> {
        info!(query = %query.query, country = %query.country, "Serper search");

        let body = serde_json::json!({
            "q": query.query,
            "gl": query.country,
            "num": query.result_count,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::from_transport(Stage::Search, &query.query, &e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ResearchError::from_transport(Stage::Search, &query.query, &e))?;

        if status != reqwest::StatusCode::OK {
            return Err(ResearchError::upstream_status(
                Stage::Search,
                &query.query,
                status.as_u16(),
                format!("unexpected status code {status}"),
            ));
        }

        let results = Self::parse_body(&query.query, &text)?;
        info!(query = %query.query, count = results.len(), "Serper search complete");
        Ok(results)
    }
}
