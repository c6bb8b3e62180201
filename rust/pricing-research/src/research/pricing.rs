//! Pricing analysis: per-country price suggestions from gathered summaries.
//!
//! The model is asked for a fixed textual layout:
//!
//! ```text
//! Suggested Selling Price:
//! Country: Mexico
//! Price: MX$650
//! Analysis: ...
//! ```
//!
//! Extraction from that text is best-effort. Missing or malformed blocks are
//! dropped, never invented, and the raw text is always kept.

use crate::domain::CountryPricing;
use crate::error::{ResearchError, ResearchResult, Stage};
use crate::logging::StageTimer;

use super::context::RunContext;
use super::map_reduce::{ChunkPrompt, MapReduce};

/// Marker that introduces the per-country section.
pub const PRICING_MARKER: &str = "Suggested Selling Price:";

/// Marker that introduces each country block.
pub const COUNTRY_MARKER: &str = "Country:";

/// Pricing instruction template.
#[derive(Debug)]
pub struct PricingPrompt<'a> {
    pub product_title: &'a str,
    pub countries: &'a [String],
}

impl ChunkPrompt for PricingPrompt<'_> {
    fn render(&self, text: &str) -> String {
        let countries = self.countries.join(", ");
        format!(
            "You are a pricing analyst. Below are summaries of a product page and of \
            competing offers found in several markets.\n\
            \n\
            Content:\n\
            \"{text}\"\n\
            \n\
            Product: \"{title}\"\n\
            Target countries: {countries}\n\
            \n\
            Suggest a selling price for the product in each target country, in that \
            country's currency with its currency symbol, based on the competitor prices above. \
            Reply in exactly this format:\n\
            \n\
            Product Details:\n\
            Title: <product title>\n\
            Price: <original price with currency symbol>\n\
            Description: <one or two sentences>\n\
            \n\
            {PRICING_MARKER}\n\
            {COUNTRY_MARKER} <country>\n\
            Price: <suggested price with currency symbol>\n\
            Analysis: <short rationale>\n\
            \n\
            Repeat the {COUNTRY_MARKER} block once for each of: {countries}.\n",
            title = self.product_title,
        )
    }
}

/// Result of extracting country blocks from model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// At least one well-formed block.
    Parsed(Vec<CountryPricing>),
    /// Nothing usable; the text is kept for inspection.
    Empty { raw: String },
}

impl ParseOutcome {
    pub fn entries(&self) -> &[CountryPricing] {
        match self {
            Self::Parsed(entries) => entries,
            Self::Empty { .. } => &[],
        }
    }

    pub fn into_entries(self) -> Vec<CountryPricing> {
        match self {
            Self::Parsed(entries) => entries,
            Self::Empty { .. } => Vec::new(),
        }
    }
}

/// Pricing output of one research run.
#[derive(Debug)]
pub struct PricingAnalysis {
    /// Model output, verbatim.
    pub raw_text: String,
    /// Extracted blocks in the order the model wrote them.
    pub country_pricing: Vec<CountryPricing>,
    /// Set when extraction came up empty or short of the requested countries.
    pub degradation: Option<ResearchError>,
}

/// Pricing Analyzer over a map-reduce runner.
#[derive(Debug, Clone)]
pub struct PricingAnalyzer {
    map_reduce: MapReduce,
}

impl PricingAnalyzer {
    pub fn new(map_reduce: MapReduce) -> Self {
        Self { map_reduce }
    }

    /// Model narrative for `joined_text`, unparsed.
    pub async fn analyze_raw(
        &self,
        ctx: &RunContext,
        joined_text: &str,
        product_title: &str,
        countries: &[String],
    ) -> ResearchResult<String> {
        let prompt = PricingPrompt {
            product_title,
            countries,
        };
        self.map_reduce.run(ctx, joined_text, &prompt).await
    }

    /// Narrative plus extracted blocks.
    ///
    /// Only language model failures are errors. Parse problems are returned
    /// in [`PricingAnalysis::degradation`].
    pub async fn analyze(
        &self,
        ctx: &RunContext,
        joined_text: &str,
        product_title: &str,
        countries: &[String],
    ) -> ResearchResult<PricingAnalysis> {
        let timer = StageTimer::new(Stage::Pricing, product_title);
        let raw_text = timer.observe(
            self.analyze_raw(ctx, joined_text, product_title, countries)
                .await,
        )?;

        let (country_pricing, degradation) = match parse(&raw_text) {
            ParseOutcome::Parsed(entries) if entries.len() < countries.len() => {
                let reason = format!(
                    "extracted {} of {} requested countries",
                    entries.len(),
                    countries.len()
                );
                (entries, Some(parse_error(reason, &raw_text)))
            }
            ParseOutcome::Parsed(entries) => (entries, None),
            ParseOutcome::Empty { raw } => (
                Vec::new(),
                Some(parse_error("no well-formed country blocks", &raw)),
            ),
        };

        Ok(PricingAnalysis {
            raw_text,
            country_pricing,
            degradation,
        })
    }
}

fn parse_error(reason: impl Into<String>, raw: &str) -> ResearchError {
    ResearchError::Parse {
        reason: reason.into(),
        raw: raw.to_string(),
    }
}

/// Extract country blocks from model output.
///
/// Markers and labels match case-insensitively, list bullets and bold
/// markers are ignored. In each block the first `Price:` and `Analysis:`
/// lines count. Unlabelled lines continue the analysis up to the next blank
/// or labelled line. A block needs a country, a price and an analysis;
/// anything less is skipped. Without the section marker the whole text is
/// searched.
pub fn parse(raw: &str) -> ParseOutcome {
    let section = after_last(raw, PRICING_MARKER).unwrap_or(raw);
    let entries: Vec<CountryPricing> = blocks(section, COUNTRY_MARKER)
        .filter_map(parse_block)
        .collect();

    if entries.is_empty() {
        ParseOutcome::Empty {
            raw: raw.to_string(),
        }
    } else {
        ParseOutcome::Parsed(entries)
    }
}

/// Text after the last case-insensitive occurrence of `marker`.
fn after_last<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    // ASCII lowercasing keeps byte offsets valid for `text`.
    let lower = text.to_ascii_lowercase();
    lower
        .rfind(&marker.to_ascii_lowercase())
        .map(|at| &text[at + marker.len()..])
}

/// Slices following each case-insensitive occurrence of `marker`.
fn blocks<'a>(text: &'a str, marker: &str) -> impl Iterator<Item = &'a str> {
    let lower = text.to_ascii_lowercase();
    let starts: Vec<usize> = lower
        .match_indices(&marker.to_ascii_lowercase())
        .map(|(at, _)| at)
        .collect();
    let marker_len = marker.len();
    (0..starts.len()).map(move |i| {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        &text[starts[i] + marker_len..end]
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Other,
    Price,
    Analysis,
}

/// Labels longer than this are read as prose that happens to hold a colon.
const MAX_LABEL_WORDS: usize = 4;

fn parse_block(block: &str) -> Option<CountryPricing> {
    let mut lines = block.lines().map(clean_line);

    let country = strip_emphasis(lines.by_ref().find(|l| !l.is_empty())?).to_string();
    if country.is_empty() {
        return None;
    }

    let mut price: Option<String> = None;
    let mut analysis: Option<String> = None;
    let mut current = Field::Other;

    for line in lines {
        if line.is_empty() {
            current = Field::Other;
            continue;
        }

        match label_of(line) {
            Some((label, value)) => {
                current = field_for(&label);
                // The first designated line wins, later repeats are ignored.
                let slot = match current {
                    Field::Price => &mut price,
                    Field::Analysis => &mut analysis,
                    Field::Other => continue,
                };
                if slot.is_some() {
                    current = Field::Other;
                } else {
                    *slot = Some(value.to_string());
                }
            }
            None if current == Field::Analysis => {
                if let Some(text) = analysis.as_mut() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(line);
                }
            }
            None => {}
        }
    }

    let price = price.filter(|p| !p.is_empty())?;
    let analysis = analysis.filter(|a| !a.is_empty())?;
    Some(CountryPricing {
        country,
        price,
        analysis,
    })
}

/// Split a `Label: value` line. Lines whose head does not read as a short
/// label are not labelled.
fn label_of(line: &str) -> Option<(String, &str)> {
    let (label, value) = line.split_once(':')?;
    let label = strip_emphasis(label);
    let is_label = !label.is_empty()
        && label.split_whitespace().count() <= MAX_LABEL_WORDS
        && label
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '(' | ')' | '/' | '-' | '\''));
    is_label.then(|| (label.to_lowercase(), strip_emphasis(value)))
}

fn field_for(label: &str) -> Field {
    match label {
        "price" => Field::Price,
        "analysis" => Field::Analysis,
        l if l.starts_with("price (") => Field::Price,
        _ => Field::Other,
    }
}

fn clean_line(line: &str) -> &str {
    line.trim().trim_start_matches(['-', '•']).trim()
}

fn strip_emphasis(text: &str) -> &str {
    text.trim().trim_matches(['*', '_']).trim()
}
