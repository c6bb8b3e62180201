//! Research Orchestrator.
//!
//! Decides between returning a stored record and running the pipeline,
//! drives the per-country fan-out, and commits the finished record in a
//! single store write. A failed run writes nothing.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use tracing::Instrument;

use crate::config::{AppConfig, CacheScope};
use crate::database::ProductRepository;
use crate::domain::{
    CompetitorSummary, NewProduct, ProductRecord, ProductUpdate, ResearchOutcome, ResearchRequest,
    ResearchStatus,
};
use crate::error::{ResearchError, ResearchResult, Stage};
use crate::llm::LlmDriver;
use crate::logging::StageTimer;
use crate::render::PageRenderer;
use crate::search::{SearchProvider, SearchQuery, SearchResult};

use super::chunking::TextSplitter;
use super::context::RunContext;
use super::map_reduce::MapReduce;
use super::pricing::PricingAnalyzer;
use super::query::QueryGenerator;
use super::retry::{retry_idempotent, RetryPolicy};
use super::summarizer::Summarizer;

/// External collaborators, constructed once by the caller and shared.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmDriver>,
    pub search: Arc<dyn SearchProvider>,
    pub renderer: Arc<dyn PageRenderer>,
    pub store: Arc<dyn ProductRepository>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("llm", &self.llm.provider())
            .finish_non_exhaustive()
    }
}

/// Tuning for research runs.
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    /// Search results requested per country.
    pub result_count: u32,
    /// Search, render and language model calls in flight at once for one
    /// run, shared by every fan-out level. 1 is sequential.
    pub concurrency: usize,
    pub cache_scope: CacheScope,
    /// Retry policy for search and render calls.
    pub retry: RetryPolicy,
    /// Wall-clock budget per run.
    pub deadline: Option<Duration>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temperature: f32,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            result_count: 5,
            concurrency: 1,
            cache_scope: CacheScope::User,
            retry: RetryPolicy::default(),
            deadline: None,
            chunk_size: 10_000,
            chunk_overlap: 500,
            temperature: 0.0,
        }
    }
}

impl ResearchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let research = &config.research;
        Self {
            result_count: config.search.result_count,
            concurrency: research.concurrency.max(1),
            cache_scope: research.cache_scope,
            retry: RetryPolicy {
                max_retries: research.max_retries,
                base_delay: Duration::from_millis(research.retry_base_delay_ms),
                max_delay: Duration::from_millis(research.retry_max_delay_ms),
            },
            deadline: config.run_deadline(),
            chunk_size: research.chunk_size,
            chunk_overlap: research.chunk_overlap,
            temperature: config.llm.temperature,
        }
    }
}

/// Workflow coordinator for research runs.
pub struct ResearchOrchestrator {
    store: Arc<dyn ProductRepository>,
    search: Arc<dyn SearchProvider>,
    query: QueryGenerator,
    summarizer: Summarizer,
    pricing: PricingAnalyzer,
    settings: ResearchSettings,
}

impl std::fmt::Debug for ResearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ResearchOrchestrator {
    pub fn new(collaborators: Collaborators, settings: ResearchSettings) -> Self {
        let Collaborators {
            llm,
            search,
            renderer,
            store,
        } = collaborators;

        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap);
        let map_reduce = MapReduce::new(Arc::clone(&llm), splitter, settings.concurrency)
            .with_temperature(settings.temperature);

        Self {
            store,
            search,
            query: QueryGenerator::new(llm, settings.temperature),
            summarizer: Summarizer::new(renderer, map_reduce.clone(), settings.retry.clone()),
            pricing: PricingAnalyzer::new(map_reduce),
            settings,
        }
    }

    pub fn settings(&self) -> &ResearchSettings {
        &self.settings
    }

    /// Run research with a fresh context bounded by the configured deadline.
    pub async fn run(&self, request: ResearchRequest) -> ResearchResult<ResearchOutcome> {
        let ctx = RunContext::new(self.settings.deadline);
        self.run_with_context(request, &ctx).await
    }

    /// Run research under a caller-supplied context.
    ///
    /// The run shares the caller's cancellation token and deadline, with its
    /// own limit of `concurrency` external calls in flight.
    pub async fn run_with_context(
        &self,
        request: ResearchRequest,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutcome> {
        request.validate()?;
        let ctx = ctx.clone().with_call_limit(self.settings.concurrency);

        let span = tracing::info_span!(
            "research",
            run_id = %ctx.run_id(),
            user_id = %request.user_id,
            url = %request.product_url,
        );
        self.execute(&request, &ctx).instrument(span).await
    }

    /// Records previously computed for `user_id`, oldest first.
    pub async fn list_products(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>> {
        if user_id.trim().is_empty() {
            return Err(ResearchError::validation("user_id", "must not be empty"));
        }
        self.store.find_by_user(user_id).await
    }

    pub async fn get_product(&self, id: i64) -> ResearchResult<ProductRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ResearchError::ProductNotFound { id })
    }

    async fn execute(
        &self,
        request: &ResearchRequest,
        ctx: &RunContext,
    ) -> ResearchResult<ResearchOutcome> {
        ctx.ensure_active(Stage::Lookup)?;
        let existing = StageTimer::new(Stage::Lookup, &request.product_url)
            .observe(self.lookup(request).await)?;

        if let Some(record) = existing.as_ref().filter(|_| !request.reanalyze) {
            tracing::info!(
                product_id = record.id,
                "Product already researched, returning stored record"
            );
            return Ok(ResearchOutcome {
                record: record.clone(),
                status: ResearchStatus::AlreadyExists,
            });
        }

        tracing::info!(
            countries = request.countries.len(),
            reanalyze = request.reanalyze,
            "Starting research run"
        );

        let primary = self
            .summarizer
            .summarize(
                ctx,
                &request.product_url,
                &request.product_title,
                &request.countries,
            )
            .await?;

        let competitors = self.research_countries(ctx, request).await?;

        let scrape_details = std::iter::once(primary.as_str())
            .chain(competitors.iter().map(|c| c.summary.as_str()))
            .collect::<Vec<_>>()
            .join("\n");

        let pricing = self
            .pricing
            .analyze(
                ctx,
                &scrape_details,
                &request.product_title,
                &request.countries,
            )
            .await?;
        if let Some(degradation) = &pricing.degradation {
            tracing::warn!(
                error = %degradation,
                extracted = pricing.country_pricing.len(),
                requested = request.countries.len(),
                "Pricing extraction degraded, keeping raw analysis"
            );
        }

        ctx.ensure_active(Stage::Persistence)?;
        let product = NewProduct {
            user_id: request.user_id.clone(),
            url: request.product_url.clone(),
            title: request.product_title.clone(),
            scrape_details,
            analysis_result: pricing.raw_text,
            country_pricing_analysis: pricing.country_pricing,
            competitor_analysis: competitors,
        };

        StageTimer::new(Stage::Persistence, &request.product_url)
            .observe(self.persist(request, existing, product).await)
    }

    async fn lookup(&self, request: &ResearchRequest) -> ResearchResult<Option<ProductRecord>> {
        match self.settings.cache_scope {
            CacheScope::User => {
                self.store
                    .find_by_user_and_url(&request.user_id, &request.product_url)
                    .await
            }
            CacheScope::Global => self.store.find_by_url(&request.product_url).await,
        }
    }

    /// Single write: update the requester's record when one exists, else insert.
    async fn persist(
        &self,
        request: &ResearchRequest,
        existing: Option<ProductRecord>,
        product: NewProduct,
    ) -> ResearchResult<ResearchOutcome> {
        let own_exists = match existing {
            Some(record) if record.user_id == request.user_id => true,
            // Global scope hit on another user's record.
            Some(_) => self
                .store
                .find_by_user_and_url(&request.user_id, &request.product_url)
                .await?
                .is_some(),
            None => false,
        };

        if own_exists {
            let record = self
                .store
                .update_by_user_and_url(
                    &request.user_id,
                    &request.product_url,
                    ProductUpdate::from(product),
                )
                .await?;
            tracing::info!(product_id = record.id, "Research record updated");
            Ok(ResearchOutcome {
                record,
                status: ResearchStatus::Updated,
            })
        } else {
            let record = self.store.insert(product).await?;
            tracing::info!(product_id = record.id, "Research record created");
            Ok(ResearchOutcome {
                record,
                status: ResearchStatus::Created,
            })
        }
    }

    /// Per-country fan-out. Output is grouped by country in request order,
    /// then by search rank, regardless of concurrency.
    async fn research_countries(
        &self,
        ctx: &RunContext,
        request: &ResearchRequest,
    ) -> ResearchResult<Vec<CompetitorSummary>> {
        let countries: Vec<_> = request
            .countries
            .iter()
            .map(|country| async move {
                self.research_country(ctx, request, country)
                    .await
                    .map_err(|e| e.in_country(country))
            })
            .collect();
        let per_country: Vec<Vec<CompetitorSummary>> = futures::stream::iter(countries)
            .buffered(self.settings.concurrency)
            .try_collect()
            .await?;

        Ok(per_country.into_iter().flatten().collect())
    }

    async fn research_country(
        &self,
        ctx: &RunContext,
        request: &ResearchRequest,
        country: &str,
    ) -> ResearchResult<Vec<CompetitorSummary>> {
        let query = StageTimer::new(Stage::LanguageModel, country).observe(
            self.query
                .generate_query(ctx, &request.product_title, country)
                .await,
        )?;

        let search_query = SearchQuery {
            query,
            country: country.to_string(),
            result_count: self.settings.result_count,
        };
        let results = StageTimer::new(Stage::Search, country).observe(
            retry_idempotent(
                &self.settings.retry,
                ctx,
                Stage::Search,
                &search_query.query,
                || self.search.search(&search_query),
            )
            .await,
        )?;

        let links: Vec<String> = results
            .iter()
            .filter_map(SearchResult::usable_link)
            .take(self.settings.result_count as usize)
            .map(str::to_string)
            .collect();
        tracing::debug!(
            country,
            query = %search_query.query,
            results = results.len(),
            links = links.len(),
            "Search completed"
        );

        let summaries: Vec<_> = links
            .into_iter()
            .map(|url| async move {
                let summary = self
                    .summarizer
                    .summarize(ctx, &url, &request.product_title, &request.countries)
                    .await?;
                Ok::<_, ResearchError>(CompetitorSummary { url, summary })
            })
            .collect();
        futures::stream::iter(summaries)
            .buffered(self.settings.concurrency)
            .try_collect()
            .await
    }
}
