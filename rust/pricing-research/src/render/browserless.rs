use std::time::Duration;

use async_trait::async_trait;

use super::PageRenderer;
use crate::error::{ResearchError, ResearchResult, Stage};

/// Browserless `/content` API client.
#[derive(Debug, Clone)]
pub struct BrowserlessRenderer {
    base_url: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl BrowserlessRenderer {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout,
            client,
        }
    }

    fn content_url(&self) -> String {
        format!("{}/content", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str) -> ResearchResult<String> {
        tracing::debug!(url, "Rendering page");

        let response = self
            .client
            .post(self.content_url())
            .query(&[("token", self.token.as_str())])
            .timeout(self.timeout)
            .header("Cache-Control", "no-cache")
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| ResearchError::from_transport(Stage::Render, url, &e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ResearchError::rendering_failed(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ResearchError::from_transport(Stage::Render, url, &e))
    }
}
