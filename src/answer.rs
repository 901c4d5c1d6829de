//! Contextual response assembly.
//!
//! [`Responder::answer`] is the request path a chat surface calls:
//!
//! 1. invalidate the `document-index` and `completion-cache` tags
//! 2. normalize the input (trim, line breaks to single spaces)
//! 3. retrieve supporting documents
//! 4. ask the completion service to answer with those documents
//!
//! Any fault from retrieval or completion is returned as-is; no partial or
//! fallback answer is produced.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use context_relay_core::cache::{CacheInvalidator, ANSWER_TAGS};
use context_relay_core::completion::CompletionService;
use context_relay_core::text::{normalize_query, word_count};
use context_relay_core::{ContextualResponse, RelayError, Result};

use crate::retrieval::Retriever;

pub struct Responder {
    retriever: Arc<Retriever>,
    completion: Arc<dyn CompletionService>,
    invalidator: Arc<dyn CacheInvalidator>,
    max_input_words: Option<usize>,
}

impl Responder {
    pub fn new(
        retriever: Arc<Retriever>,
        completion: Arc<dyn CompletionService>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            retriever,
            completion,
            invalidator,
            max_input_words: None,
        }
    }

    /// Reject inputs longer than `limit` words with a validation fault.
    pub fn with_max_input_words(mut self, limit: usize) -> Self {
        self.max_input_words = Some(limit);
        self
    }

    pub async fn answer(&self, input: &str) -> Result<ContextualResponse> {
        self.answer_with_cancel(input, &CancellationToken::new())
            .await
    }

    pub async fn answer_with_cancel(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ContextualResponse> {
        for tag in ANSWER_TAGS {
            self.invalidator.invalidate(tag);
        }

        let query = normalize_query(input);
        if let Some(limit) = self.max_input_words {
            let words = word_count(&query);
            if words > limit {
                return Err(RelayError::validation(format!(
                    "input has {} words, limit is {}",
                    words, limit
                )));
            }
        }

        let sources = self
            .retriever
            .retrieve_with_cancel(&query, self.retriever.min_results(), cancel)
            .await?;

        let completion = self
            .completion
            .complete_with_context(&query, sources.as_slice());
        let answer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            out = completion => out.map_err(RelayError::completion)?,
        };

        info!(sources = sources.len(), "contextual answer generated");
        Ok(ContextualResponse { answer, sources })
    }
}
