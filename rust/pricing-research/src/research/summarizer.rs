//! Page summarization.

use std::sync::Arc;

use crate::error::{ResearchResult, Stage};
use crate::logging::StageTimer;
use crate::render::{html_to_text, PageRenderer};

use super::context::RunContext;
use super::map_reduce::{ChunkPrompt, MapReduce};
use super::retry::{retry_idempotent, RetryPolicy};

/// Prompt that locates one product in page text and reports its details.
#[derive(Debug)]
pub struct ProductSummaryPrompt<'a> {
    pub product_title: &'a str,
    pub countries: &'a [String],
}

impl ChunkPrompt for ProductSummaryPrompt<'_> {
    fn render(&self, text: &str) -> String {
        format!(
            "Below is text taken from a web page. Find the product and summarize its key details.\n\
            \n\
            Content:\n\
            \"{text}\"\n\
            \n\
            Instructions:\n\
            1. Identify the product with the title \"{title}\".\n\
            2. Report the following details:\n\
            \x20  - Title of the product.\n\
            \x20  - Original price, with the currency symbol if one is shown (e.g. \"$38.50\").\n\
            \x20  - Main features and unique selling points.\n\
            3. Note anything relevant to pricing in these markets: {countries}.\n\
            \n\
            Example output:\n\
            - Title: Silk Tie\n\
            - Price: $38.50\n\
            - Description: A high-quality silk tie for formal events with a paisley design.\n",
            title = self.product_title,
            countries = self.countries.join(", "),
        )
    }
}

/// Renders a page and condenses it to a short product summary.
#[derive(Clone)]
pub struct Summarizer {
    renderer: Arc<dyn PageRenderer>,
    map_reduce: MapReduce,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("map_reduce", &self.map_reduce)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Summarizer {
    pub fn new(renderer: Arc<dyn PageRenderer>, map_reduce: MapReduce, retry: RetryPolicy) -> Self {
        Self {
            renderer,
            map_reduce,
            retry,
        }
    }

    /// Summarize the product named `product_title` found at `url`.
    ///
    /// Render failures carry the upstream status. Language model failures are
    /// reported against `url`.
    pub async fn summarize(
        &self,
        ctx: &RunContext,
        url: &str,
        product_title: &str,
        countries: &[String],
    ) -> ResearchResult<String> {
        let timer = StageTimer::new(Stage::Render, url);
        let html = timer.observe(
            retry_idempotent(&self.retry, ctx, Stage::Render, url, || self.renderer.render(url))
                .await,
        )?;

        let text = html_to_text(&html);
        tracing::debug!(url, chars = text.chars().count(), "Page text extracted");

        let prompt = ProductSummaryPrompt {
            product_title,
            countries,
        };
        let timer = StageTimer::new(Stage::LanguageModel, url);
        timer.observe(
            self.map_reduce
                .run(ctx, &text, &prompt)
                .await
                .map_err(|e| e.retarget(url)),
        )
    }
}
