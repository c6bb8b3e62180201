//! Page renderer abstraction.
//!
//! Product pages are usually script-heavy, so pages are rendered by a headless
//! browser service and only then reduced to text with [`html_to_text`].

mod browserless;
mod html;

pub use browserless::BrowserlessRenderer;
pub use html::html_to_text;

use async_trait::async_trait;

use crate::error::ResearchResult;

/// Headless page rendering collaborator.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url` and return the resulting HTML.
    ///
    /// A non-success upstream status fails with `UpstreamUnavailable` in the
    /// `render` stage carrying that status.
    async fn render(&self, url: &str) -> ResearchResult<String>;
}
