//! LLM provider implementations.

mod openai;

pub use openai::OpenAiDriver;

use super::{LlmDriver, LlmSettings};
use std::sync::Arc;

/// Create a driver for the given settings on a shared HTTP client.
pub fn create_driver(settings: LlmSettings, client: reqwest::Client) -> Arc<dyn LlmDriver> {
    // Every supported provider exposes the OpenAI chat-completions API.
    Arc::new(OpenAiDriver::new(settings, client))
}
