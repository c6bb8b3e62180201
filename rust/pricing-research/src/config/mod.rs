//! Configuration management for the pricing research service.
//!
//! Configuration is loaded from built-in defaults, optional config files and
//! environment variables, then checked by [`ConfigValidator`]:
//!
//! ```rust,ignore
//! use pricing_research::config::{AppConfig, ConfigValidator};
//!
//! let config = AppConfig::load_unchecked()?;
//! ConfigValidator::validate(&config)?;
//! ```

pub mod error;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmSettings, Provider};

/// Seconds between a run's default deadline and the server request timeout.
pub const DEADLINE_MARGIN_SECS: u64 = 10;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Language model configuration.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Search provider configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Page renderer configuration.
    #[serde(default)]
    pub renderer: RendererConfig,
    /// Research pipeline tuning.
    #[serde(default)]
    pub research: ResearchConfig,
    /// Product store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and config files.
    ///
    /// Sources, lowest precedence first:
    /// 1. Default values
    /// 2. Config file `config/pricing-research.{yaml,toml,json}`
    /// 3. `PRICING_*` environment variables (`__` separates nested keys)
    /// 4. Well-known variables such as `OPENAI_API_KEY` and `SERPER_API_KEY`
    ///
    /// After loading, the configuration is validated. Use [`Self::load_unchecked`]
    /// to skip validation.
    pub fn load() -> anyhow::Result<Self> {
        let config = Self::load_unchecked()?;

        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{}", e))?;

        Ok(config)
    }

    /// Load configuration without validation.
    pub fn load_unchecked() -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("llm.model", "gpt-4o")?
            .set_default("llm.temperature", 0.0)?
            .add_source(config::File::with_name("config/pricing-research").required(false))
            .add_source(
                config::Environment::with_prefix("PRICING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.apply_env_overrides();

        Ok(app_config)
    }

    /// Wall-clock budget for one research run.
    ///
    /// `research.deadline_secs` when set, otherwise the server timeout less
    /// [`DEADLINE_MARGIN_SECS`], so a slow run ends with a structured
    /// cancellation error instead of being dropped by the HTTP timeout.
    pub fn run_deadline(&self) -> Option<Duration> {
        self.research
            .deadline_secs
            .or_else(|| {
                self.server
                    .timeout_secs
                    .checked_sub(DEADLINE_MARGIN_SECS)
                    .filter(|secs| *secs > 0)
            })
            .map(Duration::from_secs)
    }

    /// Apply the well-known environment variables on top of the layered config.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(key) = std::env::var("SERPER_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("BROWSERLESS_TOKEN") {
            self.renderer.token = Some(token);
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database.path = path;
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds. Research runs get a deadline that ends
    /// before it, see [`AppConfig::run_deadline`].
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: Provider,
    /// Base URL override. Defaults to the provider's public endpoint.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens to generate per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Build driver settings from this configuration.
    pub fn to_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.provider.default_base_url().to_string()),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            provider: self.provider,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint.
    #[serde(default = "default_search_url")]
    pub base_url: String,
    /// API key sent as `X-API-KEY`.
    pub api_key: Option<String>,
    /// Results requested per country query.
    #[serde(default = "default_result_count")]
    pub result_count: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_url() -> String {
    "https://google.serper.dev/search".to_string()
}

fn default_result_count() -> u32 {
    5
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            api_key: None,
            result_count: default_result_count(),
            timeout_secs: default_search_timeout(),
        }
    }
}

/// Page renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Renderer base URL. `/content` is appended.
    #[serde(default = "default_renderer_url")]
    pub base_url: String,
    /// Access token passed as the `token` query parameter.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_renderer_timeout")]
    pub timeout_secs: u64,
}

fn default_renderer_url() -> String {
    "https://chrome.browserless.io".to_string()
}

fn default_renderer_timeout() -> u64 {
    60
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: default_renderer_url(),
            token: None,
            timeout_secs: default_renderer_timeout(),
        }
    }
}

/// Which key the "already researched" lookup uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Look up by `(user_id, url)`.
    #[default]
    User,
    /// Look up by `url` alone, shared across users.
    Global,
}

/// Research pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Maximum characters per chunk handed to the language model.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Concurrent countries, search results and chunks in flight. 1 is sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Retries after the first attempt for search and render calls.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single backoff in milliseconds.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Optional wall-clock budget for one research run.
    pub deadline_secs: Option<u64>,
    /// Cache lookup scope.
    #[serde(default)]
    pub cache_scope: CacheScope,
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_chunk_overlap() -> usize {
    500
}

fn default_concurrency() -> usize {
    1
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    8_000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            deadline_secs: None,
            cache_scope: CacheScope::default(),
        }
    }
}

/// Product store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for the in-process store.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "./data/pricing-research.sqlite".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl DatabaseConfig {
    /// Whether records live only in process memory.
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
