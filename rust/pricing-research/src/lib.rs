//! Pricing Research - product pricing research service
//!
//! Given a product URL, a product title and a list of target countries, this
//! crate gathers competitor pricing signals from the web, asks a language
//! model for per-country price suggestions, and persists the result keyed by
//! user and URL. Repeat lookups are served from storage unless the caller asks
//! for a re-analysis, so the paid external APIs are only hit when needed.
//!
//! # Architecture
//!
//! - [`config`]: Configuration loading and validation
//! - [`llm`]: Language model driver abstraction and the OpenAI-compatible driver
//! - [`search`]: Search provider abstraction and the Serper client
//! - [`render`]: Page renderer abstraction, Browserless client, HTML to text
//! - [`research`]: Summarizer, query generator, pricing analyzer and the
//!   research orchestrator that ties them together
//! - [`database`]: Product store abstraction with SQLite and in-memory backends
//! - [`api`]: HTTP endpoints
//! - [`server`]: Application assembly
//!
//! # Example
//!
//! ```rust,ignore
//! use pricing_research::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod llm;
pub mod logging;
pub mod render;
pub mod research;
pub mod search;
pub mod server;

use std::sync::Arc;

use config::AppConfig;
use research::ResearchOrchestrator;

pub use error::{ResearchError, ResearchResult, Stage};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Research workflow coordinator.
    pub orchestrator: Arc<ResearchOrchestrator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
