//! Scripted, call-counting collaborators for pipeline tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use pricing_research::database::{InMemoryStore, ProductRepository};
use pricing_research::domain::{NewProduct, ProductRecord, ProductUpdate, ResearchRequest};
use pricing_research::llm::{LlmDriver, LlmRequest, LlmResponse, LlmSettings, Provider};
use pricing_research::render::PageRenderer;
use pricing_research::research::{
    Collaborators, ResearchOrchestrator, ResearchSettings, RetryPolicy,
};
use pricing_research::search::{SearchProvider, SearchQuery, SearchResult};
use pricing_research::{ResearchError, ResearchResult, Stage};

/// Tracks how many scripted external calls are running at once.
#[derive(Default)]
pub struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of calls seen in flight together.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

/// Language model that answers from the prompt it is given.
///
/// - query prompts: `silk tie price <country>`
/// - summary prompts: `summary of <page text>`
/// - pricing prompts: one well-formed block per target country, unless a
///   reply was scripted with [`ScriptedLlm::set_pricing_reply`]
pub struct ScriptedLlm {
    settings: LlmSettings,
    calls: AtomicUsize,
    pricing_reply: Mutex<Option<String>>,
    price_prefix: Mutex<String>,
    delay: Mutex<Option<Duration>>,
    gauge: Arc<Gauge>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::with_gauge(Arc::new(Gauge::default()))
    }

    pub fn with_gauge(gauge: Arc<Gauge>) -> Self {
        Self {
            settings: LlmSettings::default(),
            calls: AtomicUsize::new(0),
            pricing_reply: Mutex::new(None),
            price_prefix: Mutex::new("$".to_string()),
            delay: Mutex::new(None),
            gauge,
        }
    }

    /// Sleep inside every completion.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_pricing_reply(&self, reply: impl Into<String>) {
        *self.pricing_reply.lock() = Some(reply.into());
    }

    /// Change the prices written in generated pricing replies.
    pub fn set_price_prefix(&self, prefix: impl Into<String>) {
        *self.price_prefix.lock() = prefix.into();
    }

    fn pricing(&self, prompt: &str) -> String {
        if let Some(reply) = self.pricing_reply.lock().clone() {
            return reply;
        }
        let prefix = self.price_prefix.lock().clone();
        let countries = between(prompt, "Target countries: ", "\n").unwrap_or_default();
        let mut reply = String::from(
            "Product Details:\nTitle: Silk Tie\nPrice: $38.50\nDescription: A silk tie.\n\n\
             Suggested Selling Price:\n",
        );
        for (i, country) in countries.split(", ").enumerate() {
            reply.push_str(&format!(
                "Country: {country}\nPrice: {prefix}{}\nAnalysis: Priced for {country}.\n\n",
                40 + i
            ));
        }
        reply
    }
}

#[async_trait]
impl LlmDriver for ScriptedLlm {
    async fn complete(&self, req: LlmRequest) -> ResearchResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        self.gauge.enter();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.gauge.exit();

        let prompt = req.last_user_text().unwrap_or_default();

        let reply = if prompt.contains("You are a pricing analyst") {
            self.pricing(prompt)
        } else if let Some(country) = between(prompt, "potential market in '", "'") {
            format!("silk tie price {country}")
        } else {
            let content = between(prompt, "Content:\n\"", "\"\n").unwrap_or_default();
            format!("summary of {content}")
        };
        Ok(LlmResponse::text(reply))
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

/// Search provider returning two links per country, plus one linkless result.
pub struct ScriptedSearch {
    queries: Mutex<Vec<SearchQuery>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().clone()
    }
}

/// Result link `rank` (1-based) for `country`.
pub fn competitor_url(country: &str, rank: usize) -> String {
    format!("https://{}.example/{rank}", country.to_lowercase())
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, query: &SearchQuery) -> ResearchResult<Vec<SearchResult>> {
        self.queries.lock().push(query.clone());
        let mut results: Vec<SearchResult> = (1..=2)
            .map(|rank| SearchResult {
                title: Some(format!("Result {rank}")),
                link: Some(competitor_url(&query.country, rank)),
                snippet: None,
            })
            .collect();
        results.push(SearchResult {
            title: Some("Sponsored".to_string()),
            ..SearchResult::default()
        });
        Ok(results)
    }
}

/// Page renderer serving `<p>page URL</p>`, with scripted failures.
pub struct ScriptedRenderer {
    rendered: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, (u16, usize)>>,
    delay: Mutex<Option<Duration>>,
    gauge: Arc<Gauge>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::with_gauge(Arc::new(Gauge::default()))
    }

    pub fn with_gauge(gauge: Arc<Gauge>) -> Self {
        Self {
            rendered: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            gauge,
        }
    }

    pub fn calls(&self) -> usize {
        self.rendered.lock().len()
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    /// Answer `status` for `url` on every call.
    pub fn fail_always(&self, url: &str, status: u16) {
        self.fail_times(url, status, usize::MAX);
    }

    /// Answer `status` for `url` on the next `times` calls.
    pub fn fail_times(&self, url: &str, status: u16, times: usize) {
        self.failures.lock().insert(url.to_string(), (status, times));
    }

    /// Sleep before every render.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, url: &str) -> ResearchResult<String> {
        self.rendered.lock().push(url.to_string());

        let delay = *self.delay.lock();
        self.gauge.enter();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.gauge.exit();

        let failure = {
            let mut failures = self.failures.lock();
            match failures.get_mut(url) {
                Some((status, remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*status)
                }
                _ => None,
            }
        };
        if let Some(status) = failure {
            return Err(ResearchError::rendering_failed(url, status));
        }
        Ok(format!("<html><body><p>page {url}</p></body></html>"))
    }
}

/// In-memory store that counts writes.
pub struct CountingStore {
    inner: InMemoryStore,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl ProductRepository for CountingStore {
    async fn insert(&self, product: NewProduct) -> ResearchResult<ProductRecord> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(product).await
    }

    async fn find_by_url(&self, url: &str) -> ResearchResult<Option<ProductRecord>> {
        self.inner.find_by_url(url).await
    }

    async fn find_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
    ) -> ResearchResult<Option<ProductRecord>> {
        self.inner.find_by_user_and_url(user_id, url).await
    }

    async fn update_by_user_and_url(
        &self,
        user_id: &str,
        url: &str,
        update: ProductUpdate,
    ) -> ResearchResult<ProductRecord> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_by_user_and_url(user_id, url, update).await
    }

    async fn find_by_id(&self, id: i64) -> ResearchResult<Option<ProductRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_user(&self, user_id: &str) -> ResearchResult<Vec<ProductRecord>> {
        self.inner.find_by_user(user_id).await
    }
}

/// All four doubles, kept so tests can inspect them after a run.
pub struct Harness {
    /// Language model and render calls in flight, counted together.
    pub in_flight: Arc<Gauge>,
    pub llm: Arc<ScriptedLlm>,
    pub search: Arc<ScriptedSearch>,
    pub renderer: Arc<ScriptedRenderer>,
    pub store: Arc<CountingStore>,
}

impl Harness {
    pub fn new() -> Self {
        let in_flight = Arc::new(Gauge::default());
        Self {
            llm: Arc::new(ScriptedLlm::with_gauge(Arc::clone(&in_flight))),
            search: Arc::new(ScriptedSearch::new()),
            renderer: Arc::new(ScriptedRenderer::with_gauge(Arc::clone(&in_flight))),
            store: Arc::new(CountingStore::new()),
            in_flight,
        }
    }

    pub fn orchestrator(&self, settings: ResearchSettings) -> ResearchOrchestrator {
        ResearchOrchestrator::new(
            Collaborators {
                llm: Arc::clone(&self.llm) as Arc<dyn LlmDriver>,
                search: Arc::clone(&self.search) as Arc<dyn SearchProvider>,
                renderer: Arc::clone(&self.renderer) as Arc<dyn PageRenderer>,
                store: Arc::clone(&self.store) as Arc<dyn ProductRepository>,
            },
            settings,
        )
    }

    /// Search, render and language model calls so far.
    pub fn external_calls(&self) -> usize {
        self.llm.calls() + self.search.calls() + self.renderer.calls()
    }
}

/// Settings with millisecond retry backoff.
pub fn fast_settings() -> ResearchSettings {
    ResearchSettings {
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..ResearchSettings::default()
    }
}

pub fn request(user_id: &str, url: &str, countries: &[&str], reanalyze: bool) -> ResearchRequest {
    ResearchRequest {
        product_url: url.to_string(),
        product_title: "Silk Tie".to_string(),
        countries: countries.iter().map(ToString::to_string).collect(),
        user_id: user_id.to_string(),
        reanalyze,
    }
}

/// Stage of an upstream failure, or `None` for other errors.
pub fn upstream_stage(err: &ResearchError) -> Option<Stage> {
    match err {
        ResearchError::UpstreamUnavailable { stage, .. } => Some(*stage),
        _ => None,
    }
}
