//! Application assembly.
//!
//! Builds every external client once, injects them into the research
//! orchestrator, and wires the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api;
use crate::config::AppConfig;
use crate::database::{Database, ProductRepository};
use crate::llm::providers::create_driver;
use crate::render::{BrowserlessRenderer, PageRenderer};
use crate::research::{Collaborators, ResearchOrchestrator, ResearchSettings};
use crate::search::{SearchProvider, SerperClient};
use crate::{log_banner, log_init_step, log_init_warning, log_success, AppState};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the application router from configuration.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    log_banner!(
        format!("💰 Pricing Research v{VERSION}"),
        format!(
            "Cache scope: {:?} | Concurrency: {}",
            config.research.cache_scope, config.research.concurrency
        )
    );

    // One HTTP client shared by every outbound collaborator.
    let http = reqwest::Client::builder()
        .user_agent(concat!("pricing-research/", env!("CARGO_PKG_VERSION")))
        .build()?;
    log_init_step!(1, 6, "HTTP Client", "🔌 Shared connection pool ready");

    let llm_settings = config.llm.to_settings();
    log_init_step!(
        2,
        6,
        "Language Model",
        format!(
            "⚙️ {} ({}) {}",
            llm_settings.provider.as_str(),
            llm_settings.model,
            if llm_settings.api_key.is_some() {
                "✓"
            } else {
                "✗ No API key"
            }
        )
    );
    if llm_settings.api_key.is_none() {
        log_init_warning!(
            "No API key configured for provider: {}. Completions will fail.",
            llm_settings.provider.as_str()
        );
    }
    let llm = create_driver(llm_settings, http.clone());

    let search: Arc<dyn SearchProvider> = Arc::new(SerperClient::new(
        config.search.base_url.clone(),
        config.search.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.search.timeout_secs),
        http.clone(),
    ));
    log_init_step!(
        3,
        6,
        "Search Provider",
        format!("🔎 {} ({} results)", config.search.base_url, config.search.result_count)
    );

    let renderer: Arc<dyn PageRenderer> = Arc::new(BrowserlessRenderer::new(
        config.renderer.base_url.clone(),
        config.renderer.token.clone().unwrap_or_default(),
        Duration::from_secs(config.renderer.timeout_secs),
        http,
    ));
    log_init_step!(4, 6, "Page Renderer", format!("🖥️  {}", config.renderer.base_url));

    let database = Database::from_config(&config.database).await?;
    log_init_step!(
        5,
        6,
        "Database",
        format!("🗄️  {} ({})", database.backend_name(), config.database.path)
    );
    let store: Arc<dyn ProductRepository> = Arc::new(database);

    let orchestrator = ResearchOrchestrator::new(
        Collaborators {
            llm,
            search,
            renderer,
            store,
        },
        ResearchSettings::from_config(&config),
    );

    let state = AppState {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator),
    };
    let app = router(state);
    log_init_step!(6, 6, "Router", "🌐 Routes + middleware configured");

    log_success!("Pricing research server created successfully");
    Ok(app)
}

/// HTTP router over an assembled state.
pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_secs);
    api::create_router()
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
