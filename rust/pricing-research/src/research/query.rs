//! Search query generation.

use std::sync::Arc;

use crate::error::{ResearchResult, Stage};
use crate::llm::{LlmDriver, LlmRequest};

use super::context::RunContext;

fn query_prompt(product_title: &str, country: &str) -> String {
    format!(
        "Given the product '{product_title}' and its potential market in '{country}', \
        write one Google search query that finds pages selling or pricing this product \
        in that market. Reply with the query only."
    )
}

/// Turns a (product title, country) pair into a search query.
#[derive(Clone)]
pub struct QueryGenerator {
    llm: Arc<dyn LlmDriver>,
    temperature: f32,
}

impl std::fmt::Debug for QueryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGenerator")
            .field("provider", &self.llm.provider())
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LlmDriver>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// One completion; the trimmed text is returned as-is.
    pub async fn generate_query(
        &self,
        ctx: &RunContext,
        product_title: &str,
        country: &str,
    ) -> ResearchResult<String> {
        let request =
            LlmRequest::prompt(query_prompt(product_title, country)).with_temperature(self.temperature);
        let response = ctx
            .guard(Stage::LanguageModel, self.llm.complete(request))
            .await?;
        Ok(response.content.trim().to_string())
    }
}
