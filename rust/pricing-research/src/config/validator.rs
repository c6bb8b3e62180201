//! Configuration validation.
//!
//! Runs once at startup and reports every problem together so a broken
//! deployment can be fixed in one pass.

use super::error::{ConfigResult, ConfigurationError};
use super::{AppConfig, LlmConfig, ResearchConfig};
use crate::llm::Provider;

/// Configuration validator.
///
/// | Setting | Rule |
/// |---------|------|
/// | `search.api_key` | required |
/// | `renderer.token` | required |
/// | `llm.api_key` | required unless the provider is `custom` |
/// | `research.chunk_size` | greater than zero |
/// | `research.chunk_overlap` | smaller than `chunk_size` |
/// | `research.concurrency` | greater than zero |
/// | `search.result_count` | greater than zero |
/// | `research.deadline_secs` | positive and shorter than `server.timeout_secs` |
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire application configuration.
    ///
    /// Returns `Ok(())` if valid, or a `ConfigurationError` with all issues.
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_credentials(config) {
            match e {
                ConfigurationError::Multiple(errs) => errors.extend(errs),
                e => errors.push(e),
            }
        }

        if let Err(e) = Self::validate_research(&config.research) {
            match e {
                ConfigurationError::Multiple(errs) => errors.extend(errs),
                e => errors.push(e),
            }
        }

        if let Some(deadline) = config.research.deadline_secs
            && deadline >= config.server.timeout_secs
        {
            errors.push(ConfigurationError::incompatible(
                format!("research.deadline_secs={deadline}"),
                format!("server.timeout_secs={}", config.server.timeout_secs),
                "The HTTP timeout would drop the run before its deadline reports a \
                cancellation. Lower PRICING_RESEARCH__DEADLINE_SECS or raise \
                PRICING_SERVER__TIMEOUT_SECS.",
            ));
        }

        if config.search.result_count == 0 {
            errors.push(ConfigurationError::invalid(
                "search.result_count is 0, so no competitor pages would be researched",
                "Set PRICING_SEARCH__RESULT_COUNT to a positive number (default 5)",
            ));
        }

        ConfigurationError::collect(errors)
    }

    /// Validate that every external service has credentials.
    pub fn validate_credentials(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if is_blank(config.search.api_key.as_deref()) {
            errors.push(ConfigurationError::missing_required(
                "Search API key",
                "Finding competitor pages for each target country",
                "SERPER_API_KEY",
            ));
        }

        if is_blank(config.renderer.token.as_deref()) {
            errors.push(ConfigurationError::missing_required(
                "Page renderer token",
                "Rendering product and competitor pages",
                "BROWSERLESS_TOKEN",
            ));
        }

        if let Err(e) = Self::validate_llm_config(&config.llm) {
            errors.push(e);
        }

        ConfigurationError::collect(errors)
    }

    /// Validate language model configuration.
    pub fn validate_llm_config(llm: &LlmConfig) -> ConfigResult<()> {
        if llm.provider == Provider::Custom {
            if is_blank(llm.base_url.as_deref()) {
                return Err(ConfigurationError::missing_required(
                    "LLM base URL",
                    "Custom OpenAI-compatible provider",
                    "PRICING_LLM__BASE_URL",
                ));
            }
            return Ok(());
        }

        if is_blank(llm.api_key.as_deref()) {
            return Err(ConfigurationError::missing_required(
                "LLM API Key",
                "Summarizing pages and suggesting prices",
                "OPENAI_API_KEY (or PRICING_LLM__API_KEY for other providers)",
            ));
        }

        Ok(())
    }

    /// Validate chunking and fan-out settings.
    pub fn validate_research(research: &ResearchConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if research.chunk_size == 0 {
            errors.push(ConfigurationError::invalid(
                "research.chunk_size is 0",
                "Set PRICING_RESEARCH__CHUNK_SIZE to a positive number of characters (default 10000)",
            ));
        } else if research.chunk_overlap >= research.chunk_size {
            errors.push(ConfigurationError::incompatible(
                format!("research.chunk_overlap={}", research.chunk_overlap),
                format!("research.chunk_size={}", research.chunk_size),
                "Chunk overlap must be smaller than the chunk size, otherwise splitting \
                never advances. Lower PRICING_RESEARCH__CHUNK_OVERLAP.",
            ));
        }

        if research.concurrency == 0 {
            errors.push(ConfigurationError::invalid(
                "research.concurrency is 0",
                "Set PRICING_RESEARCH__CONCURRENCY to 1 for sequential runs or higher for fan-out",
            ));
        }

        if research.deadline_secs == Some(0) {
            errors.push(ConfigurationError::invalid(
                "research.deadline_secs is 0, so every run would be cancelled immediately",
                "Unset PRICING_RESEARCH__DEADLINE_SECS or give it a positive value",
            ));
        }

        ConfigurationError::collect(errors)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        config.search.api_key = Some("serper-test".to_string());
        config.renderer.token = Some("browserless-test".to_string());
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(ConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_credentials_reported_together() {
        let config = AppConfig::default();
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(err.count(), 3);
        let msg = err.to_string();
        assert!(msg.contains("SERPER_API_KEY"));
        assert!(msg.contains("BROWSERLESS_TOKEN"));
        assert!(msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut config = valid_config();
        config.search.api_key = Some("   ".to_string());
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("SERPER_API_KEY"));
    }

    #[test]
    fn test_custom_provider_needs_base_url_not_key() {
        let mut config = valid_config();
        config.llm.provider = Provider::Custom;
        config.llm.api_key = None;
        assert!(ConfigValidator::validate(&config).is_err());

        config.llm.base_url = Some("http://localhost:11434".to_string());
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = valid_config();
        config.research.chunk_size = 400;
        config.research.chunk_overlap = 400;
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::Incompatible { .. }));
    }

    #[test]
    fn test_deadline_must_end_before_server_timeout() {
        let mut config = valid_config();
        config.server.timeout_secs = 300;
        config.research.deadline_secs = Some(300);
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::Incompatible { .. }));
        assert!(err.to_string().contains("PRICING_RESEARCH__DEADLINE_SECS"));

        config.research.deadline_secs = Some(240);
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = valid_config();
        config.research.chunk_size = 0;
        config.research.concurrency = 0;
        config.search.result_count = 0;
        config.research.deadline_secs = Some(0);
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(err.count(), 4);
    }
}
