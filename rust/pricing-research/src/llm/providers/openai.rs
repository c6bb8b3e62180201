//! OpenAI and OpenAI-compatible provider driver.
//!
//! This driver supports OpenAI, Groq, xAI, and any OpenAI-compatible API.

use crate::error::{ResearchError, ResearchResult, Stage};
use crate::llm::{LlmDriver, LlmRequest, LlmResponse, LlmSettings, Provider, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// OpenAI-compatible API driver.
#[derive(Debug, Clone)]
pub struct OpenAiDriver {
    settings: LlmSettings,
    client: Client,
}

impl OpenAiDriver {
    /// Create a new driver on a shared client.
    pub fn new(settings: LlmSettings, client: Client) -> Self {
        Self { settings, client }
    }

    /// Build the API URL.
    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Build the JSON request body.
    fn request_body(&self, req: &LlmRequest) -> serde_json::Value {
        let model = req.model.as_ref().unwrap_or(&self.settings.model);
        let temperature = req.temperature.unwrap_or(self.settings.temperature);
        let max_tokens = req.max_tokens.unwrap_or(self.settings.max_tokens);

        serde_json::json!({
            "model": model,
            "messages": req.messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
            "stream": false,
        })
    }
}

#[async_trait]
impl LlmDriver for OpenAiDriver {
    async fn complete(&self, req: LlmRequest) -> ResearchResult<LlmResponse> {
        let body = self.request_body(&req);
        let target = self.settings.model.clone();

        let mut request = self
            .client
            .post(self.api_url())
            .timeout(self.settings.timeout)
            .json(&body);

        // Add authorization header
        if let Some(ref api_key) = self.settings.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResearchError::from_transport(Stage::LanguageModel, &target, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ResearchError::upstream_status(
                Stage::LanguageModel,
                target,
                status.as_u16(),
                format!("{} API error ({}): {}", self.provider().as_str(), status, truncate(&text)),
            ));
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            ResearchError::upstream(
                Stage::LanguageModel,
                &target,
                format!("malformed completion payload: {e}"),
            )
        })?;

        if let Some(usage) = completion.usage {
            tracing::debug!(
                model = %target,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ResearchError::upstream(Stage::LanguageModel, &target, "completion had no content")
            })?;

        Ok(LlmResponse {
            content,
            model: completion.model,
            usage: completion.usage,
        })
    }

    fn provider(&self) -> Provider {
        self.settings.provider
    }

    fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Non-streaming chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    model: Option<String>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
