//! Wiring of the runtime components around one shared rate limiter.
//!
//! [`Relay`] owns every service a front end needs: the retriever, the
//! ingestor, the keyword extractor, the contextual responder and the cache
//! tag registry. The CLI and the HTTP server both build one from the
//! configuration with [`Relay::open`]; tests assemble one over in-memory or
//! scripted backends with [`Relay::assemble`].

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use context_relay_core::completion::CompletionService;
use context_relay_core::embedding::EmbeddingProvider;
use context_relay_core::store::DocumentStore;

use crate::answer::Responder;
use crate::cache::TagRegistry;
use crate::completion::create_completion;
use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::ingest::Ingestor;
use crate::keywords::KeywordExtractor;
use crate::migrate::run_migrations;
use crate::rate_limit::RateLimiter;
use crate::retrieval::Retriever;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct Relay {
    pub retriever: Arc<Retriever>,
    pub ingestor: Arc<Ingestor>,
    pub keywords: Arc<KeywordExtractor>,
    pub responder: Arc<Responder>,
    pub tags: Arc<TagRegistry>,
}

impl Relay {
    /// Build every service over the given backends.
    pub fn assemble(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let tags = Arc::new(TagRegistry::new());

        let retriever = Arc::new(Retriever::from_config(
            store.clone(),
            limiter.clone(),
            &config.retrieval,
        ));
        let ingestor = Arc::new(Ingestor::new(store, embedder, limiter));
        let keywords = Arc::new(KeywordExtractor::new(completion.clone()));
        let responder = Arc::new(
            Responder::new(retriever.clone(), completion, tags.clone())
                .with_max_input_words(config.completion.max_input_words),
        );

        Self {
            retriever,
            ingestor,
            keywords,
            responder,
            tags,
        }
    }

    /// Open the SQLite database named in `[db]`, apply migrations and
    /// connect the configured providers.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        run_migrations(&pool).await?;

        let embedder = create_provider(&config.embedding)?;
        let completion = create_completion(&config.completion)?;

        let mut store = SqliteStore::new(pool)
            .with_alpha(config.retrieval.hybrid_alpha)
            .with_match_count(config.retrieval.match_count);
        if config.embedding.is_enabled() {
            store = store.with_embedder(embedder.clone());
        }

        info!(
            db = %config.db.path.display(),
            embedding = %config.embedding.provider,
            completion = %config.completion.provider,
            "relay ready"
        );
        Ok(Self::assemble(config, Arc::new(store), embedder, completion))
    }
}
