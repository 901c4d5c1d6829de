//! Keyword extraction through the completion service.
//!
//! Not wired into the retrieval tiers; exposed as a standalone capability
//! (CLI `relay keywords`, `POST /keywords`).

use std::sync::Arc;

use tracing::debug;

use context_relay_core::completion::CompletionService;
use context_relay_core::prompts::MOST_IMPORTANT_KEYWORDS;
use context_relay_core::text::parse_keywords;
use context_relay_core::{RelayError, Result};

pub struct KeywordExtractor {
    completion: Arc<dyn CompletionService>,
}

impl KeywordExtractor {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// The 1 to 10 most important keywords of `text`, in the model's order.
    pub async fn extract_keywords(&self, text: &str) -> Result<Vec<String>> {
        let prompt = MOST_IMPORTANT_KEYWORDS.render(&[("text", text)]);
        let response = self
            .completion
            .complete(&prompt)
            .await
            .map_err(RelayError::completion)?;

        let keywords = parse_keywords(&response)?;
        debug!(count = keywords.len(), "extracted keywords");
        Ok(keywords)
    }
}
