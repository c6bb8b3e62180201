//! Language model driver traits and implementations.
//!
//! The research pipeline only needs single-shot text completions, so the
//! [`LlmDriver`] trait is a non-streaming `prompt -> text` interface. Drivers
//! are constructed once at startup and shared behind an `Arc`.
//!
//! # Drivers
//!
//! - [`providers::OpenAiDriver`]: OpenAI and compatible APIs (Groq, xAI,
//!   self-hosted gateways)

pub mod providers;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchResult;

/// Language model connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the API.
    pub base_url: String,
    /// API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Provider type.
    pub provider: Provider,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature for sampling.
    pub temperature: f32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: Provider::OpenAi.default_base_url().to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            provider: Provider::OpenAi,
            max_tokens: 1024,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Supported providers. All speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI.
    #[default]
    OpenAi,
    /// Groq.
    Groq,
    /// xAI Grok.
    Xai,
    /// Any other OpenAI-compatible endpoint.
    Custom,
}

impl Provider {
    /// Get the default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Groq => "https://api.groq.com/openai",
            Self::Xai => "https://api.x.ai",
            Self::Custom => "",
        }
    }

    /// Lowercase provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Xai => "xai",
            Self::Custom => "custom",
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Model to use (overrides settings).
    pub model: Option<String>,
    /// Temperature (overrides settings).
    pub temperature: Option<f32>,
    /// Max tokens (overrides settings).
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Create a new request with messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Single user-message request.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Text of the last user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Completion returned by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    /// Completion text.
    pub content: String,
    /// Model that produced it, when reported.
    pub model: Option<String>,
    /// Token usage, when reported.
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Response carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            usage: None,
        }
    }
}

/// Trait for language model drivers.
#[async_trait]
pub trait LlmDriver: Send + Sync {
    /// Run one completion.
    ///
    /// Transport failures, non-success statuses and payloads without content
    /// are reported as `UpstreamUnavailable` in the `language_model` stage.
    async fn complete(&self, req: LlmRequest) -> ResearchResult<LlmResponse>;

    /// Get the provider type.
    fn provider(&self) -> Provider;

    /// Get the current settings.
    fn settings(&self) -> &LlmSettings;
}
