//! The research pipeline.
//!
//! search → scrape → summarize → price → persist, coordinated by
//! [`ResearchOrchestrator`].

pub mod chunking;
pub mod context;
pub mod map_reduce;
pub mod orchestrator;
pub mod pricing;
pub mod query;
pub mod retry;
pub mod summarizer;

pub use chunking::TextSplitter;
pub use context::RunContext;
pub use map_reduce::{ChunkPrompt, MapReduce};
pub use orchestrator::{Collaborators, ResearchOrchestrator, ResearchSettings};
pub use pricing::{parse, ParseOutcome, PricingAnalysis, PricingAnalyzer};
pub use query::QueryGenerator;
pub use retry::RetryPolicy;
pub use summarizer::Summarizer;
