//! Chunked map-then-reduce completion.
//!
//! The same prompt template is applied to every chunk (map), the partial
//! outputs are joined and, while they still exceed the chunk size, re-chunked
//! and mapped again (collapse). A final completion over the joined outputs
//! produces the answer (reduce).

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};

use crate::error::{ResearchResult, Stage};
use crate::llm::{LlmDriver, LlmRequest};

use super::chunking::{char_len, TextSplitter};
use super::context::RunContext;

/// Upper bound on collapse rounds before the final reduce is forced.
pub const DEFAULT_MAX_COLLAPSE_ROUNDS: usize = 3;

/// A prompt template with a single text slot.
pub trait ChunkPrompt: Send + Sync {
    /// Render the prompt around `text`.
    fn render(&self, text: &str) -> String;
}

/// Map-reduce runner over one language model.
#[derive(Clone)]
pub struct MapReduce {
    llm: Arc<dyn LlmDriver>,
    splitter: TextSplitter,
    concurrency: usize,
    temperature: f32,
    max_collapse_rounds: usize,
}

impl std::fmt::Debug for MapReduce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapReduce")
            .field("provider", &self.llm.provider())
            .field("splitter", &self.splitter)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_collapse_rounds", &self.max_collapse_rounds)
            .finish()
    }
}

impl MapReduce {
    pub fn new(llm: Arc<dyn LlmDriver>, splitter: TextSplitter, concurrency: usize) -> Self {
        Self {
            llm,
            splitter,
            concurrency: concurrency.max(1),
            temperature: 0.0,
            max_collapse_rounds: DEFAULT_MAX_COLLAPSE_ROUNDS,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_collapse_rounds(mut self, rounds: usize) -> Self {
        self.max_collapse_rounds = rounds;
        self
    }

    /// Run the full map, collapse, reduce sequence over `text`.
    ///
    /// A text that fits in one chunk costs a single completion: its map
    /// output is the result. Empty text is treated as one empty chunk.
    pub async fn run(
        &self,
        ctx: &RunContext,
        text: &str,
        prompt: &dyn ChunkPrompt,
    ) -> ResearchResult<String> {
        let mut chunks = self.splitter.split(text);
        if chunks.is_empty() {
            chunks.push(String::new());
        }

        let mut outputs = self.map(ctx, &chunks, prompt).await?;
        if outputs.len() == 1 {
            return Ok(outputs.remove(0));
        }

        let mut rounds = 0;
        let mut joined = outputs.join("\n");
        while char_len(&joined) > self.splitter.chunk_size() && rounds < self.max_collapse_rounds {
            let regrouped = self.splitter.split(&joined);
            tracing::debug!(
                round = rounds + 1,
                partials = outputs.len(),
                groups = regrouped.len(),
                "Collapsing map outputs"
            );
            outputs = self.map(ctx, &regrouped, prompt).await?;
            joined = outputs.join("\n");
            rounds += 1;
        }

        self.complete(ctx, prompt.render(&joined)).await
    }

    /// Apply `prompt` to every chunk. Outputs keep chunk order.
    async fn map(
        &self,
        ctx: &RunContext,
        chunks: &[String],
        prompt: &dyn ChunkPrompt,
    ) -> ResearchResult<Vec<String>> {
        let calls: Vec<_> = chunks
            .iter()
            .map(|chunk| self.complete(ctx, prompt.render(chunk)))
            .collect();
        futures::stream::iter(calls)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn complete(&self, ctx: &RunContext, prompt: String) -> ResearchResult<String> {
        let request = LlmRequest::prompt(prompt).with_temperature(self.temperature);
        let response = ctx
            .guard(Stage::LanguageModel, self.llm.complete(request))
            .await?;
        Ok(response.content.trim().to_string())
    }
}
