//! Embedding ingestion: embed new content and write it to the document store.
//!
//! There is no retry here. A failed embed or insert surfaces once as
//! [`RelayError::Ingestion`] carrying the content that was not stored, and
//! the caller decides whether to try again.

use std::sync::Arc;

use tracing::{debug, warn};

use context_relay_core::embedding::EmbeddingProvider;
use context_relay_core::store::DocumentStore;
use context_relay_core::{Document, Metadata, RelayError, Result};

use crate::rate_limit::RateLimiter;

pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    limiter: Arc<RateLimiter>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            store,
            embedder,
            limiter,
        }
    }

    /// Embed `content` and insert it together with its vector.
    ///
    /// Blank content is rejected with [`RelayError::Validation`] before any
    /// backend is contacted.
    pub async fn store_embedding(
        &self,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Document> {
        if content.trim().is_empty() {
            return Err(RelayError::validation("content must not be empty"));
        }

        let embedding = self
            .embedder
            .embed(content)
            .await
            .map_err(|e| ingestion_fault(content, RelayError::provider(e)))?;
        debug!(
            dims = embedding.len(),
            model = self.embedder.model_name(),
            "embedded content"
        );

        self.limiter.acquire().await;
        let doc = self
            .store
            .insert(content, &embedding, metadata)
            .await
            .map_err(|e| ingestion_fault(content, RelayError::store(e)))?;
        debug!(id = ?doc.id, "inserted document");

        Ok(doc)
    }
}

fn ingestion_fault(content: &str, cause: RelayError) -> RelayError {
    warn!(error = %cause, "ingestion failed");
    RelayError::Ingestion {
        content: content.to_string(),
        source: Box::new(cause),
    }
}
