//! Inbound research request.

use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, ResearchResult};

/// Request to research pricing for one product across target countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Product page URL. Also the cache key (together with `user_id`).
    pub product_url: String,
    /// Product title used to locate the product on scraped pages.
    pub product_title: String,
    /// Target countries, researched in the order given. Duplicates are kept.
    pub countries: Vec<String>,
    /// Owner of the resulting record.
    pub user_id: String,
    /// Force a fresh run even when a stored record exists.
    #[serde(default)]
    pub reanalyze: bool,
}

impl ResearchRequest {
    /// Validate the request once, at the boundary.
    ///
    /// The URL must parse as an absolute `http` or `https` URL because the page
    /// renderer is handed it verbatim.
    pub fn validate(&self) -> ResearchResult<()> {
        if self.product_url.trim().is_empty() {
            return Err(ResearchError::validation("product_url", "must not be empty"));
        }
        match url::Url::parse(&self.product_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ResearchError::validation(
                    "product_url",
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ));
            }
            Err(e) => {
                return Err(ResearchError::validation(
                    "product_url",
                    format!("is not a valid URL: {e}"),
                ));
            }
        }
        if self.product_title.trim().is_empty() {
            return Err(ResearchError::validation("product_title", "must not be empty"));
        }
        if self.countries.is_empty() {
            return Err(ResearchError::validation("countries", "must not be empty"));
        }
        if let Some(pos) = self.countries.iter().position(|c| c.trim().is_empty()) {
            return Err(ResearchError::validation(
                "countries",
                format!("entry {pos} is blank"),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(ResearchError::validation("user_id", "must not be empty"));
        }
        Ok(())
    }
}
