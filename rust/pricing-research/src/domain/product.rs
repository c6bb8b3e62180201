//! Product records and the research response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suggested price and rationale for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryPricing {
    /// Country name as written by the model.
    pub country: String,
    /// Suggested price, with local currency symbol.
    pub price: String,
    /// Rationale for the suggestion.
    pub analysis: String,
}

/// Summary of one competitor page found through search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorSummary {
    /// Page URL returned by the search provider.
    pub url: String,
    /// Model summary of the page.
    pub summary: String,
}

/// Persisted research result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Store-assigned identifier. Stable across updates.
    pub id: i64,
    /// Owner of the record.
    pub user_id: String,
    /// Researched product URL.
    pub url: String,
    /// Product title.
    pub title: String,
    /// Newline-joined summaries gathered in one run (primary page first).
    pub scrape_details: String,
    /// Raw pricing narrative from the model.
    pub analysis_result: String,
    /// Structured per-country pricing, best effort.
    pub country_pricing_analysis: Vec<CountryPricing>,
    /// One entry per successfully scraped search result.
    pub competitor_analysis: Vec<CompetitorSummary>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Fully populated record candidate, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub scrape_details: String,
    pub analysis_result: String,
    pub country_pricing_analysis: Vec<CountryPricing>,
    pub competitor_analysis: Vec<CompetitorSummary>,
}

/// Partial update applied to an existing record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub scrape_details: Option<String>,
    pub analysis_result: Option<String>,
    pub country_pricing_analysis: Option<Vec<CountryPricing>>,
    pub competitor_analysis: Option<Vec<CompetitorSummary>>,
}

impl From<NewProduct> for ProductUpdate {
    fn from(product: NewProduct) -> Self {
        Self {
            title: Some(product.title),
            scrape_details: Some(product.scrape_details),
            analysis_result: Some(product.analysis_result),
            country_pricing_analysis: Some(product.country_pricing_analysis),
            competitor_analysis: Some(product.competitor_analysis),
        }
    }
}

impl ProductUpdate {
    /// Apply the present fields to a record and bump `updated_at`.
    pub fn apply_to(self, record: &mut ProductRecord, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(scrape_details) = self.scrape_details {
            record.scrape_details = scrape_details;
        }
        if let Some(analysis_result) = self.analysis_result {
            record.analysis_result = analysis_result;
        }
        if let Some(pricing) = self.country_pricing_analysis {
            record.country_pricing_analysis = pricing;
        }
        if let Some(competitors) = self.competitor_analysis {
            record.competitor_analysis = competitors;
        }
        record.updated_at = now;
    }
}

/// How a research run was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    /// New record inserted.
    Created,
    /// Existing record re-analysed in place.
    Updated,
    /// Stored record returned without any external calls.
    AlreadyExists,
}

impl ResearchStatus {
    /// Human-readable message shown to the caller.
    pub fn message(self) -> &'static str {
        match self {
            Self::Created => "Product analysis conducted successfully.",
            Self::Updated => "Product analysis updated successfully.",
            Self::AlreadyExists => {
                "Product analysis already exists. Click 'Reanalyze' to update the analysis."
            }
        }
    }
}

/// Result of a research run: the record and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchOutcome {
    pub record: ProductRecord,
    pub status: ResearchStatus,
}

/// JSON response of the "run research" command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub product_id: i64,
    pub analysis: String,
    pub scrape_details: String,
    pub url: String,
    pub title: String,
    pub country_pricing_analysis: Vec<CountryPricing>,
    pub competitor_analysis: Vec<CompetitorSummary>,
    pub message: String,
    pub status: ResearchStatus,
}

impl From<ResearchOutcome> for ResearchResponse {
    fn from(outcome: ResearchOutcome) -> Self {
        let ResearchOutcome { record, status } = outcome;
        Self {
            product_id: record.id,
            analysis: record.analysis_result,
            scrape_details: record.scrape_details,
            url: record.url,
            title: record.title,
            country_pricing_analysis: record.country_pricing_analysis,
            competitor_analysis: record.competitor_analysis,
            message: status.message().to_string(),
            status,
        }
    }
}
