//! Tiered document retrieval.
//!
//! [`Retriever::retrieve`] gathers at least `min_results` distinct document
//! contents for a query by escalating through three progressively looser
//! strategies, stopping as soon as the threshold is met:
//!
//! 1. **Hybrid**: one hybrid (vector + lexical) search for the whole query.
//! 2. **Keyword**: one hybrid search per leading query token, run
//!    concurrently and joined before the threshold is checked again.
//! 3. **Full-text**: one web-search style lexical search for the whole
//!    query, English profile.
//!
//! A call makes at most 1 + `keyword_tokens` + 1 store requests and never
//! retries. Coming back with fewer than `min_results` documents is a normal
//! outcome. Results are deduplicated by exact content and keep arrival
//! order across tiers; the backend's order within a tier is preserved and
//! nothing is re-scored.
//!
//! Every store request first waits on the shared [`RateLimiter`].
//!
//! # Faults
//!
//! The first fault of any tier aborts the whole `retrieve` call. Callers that
//! want to recover at a tier boundary can run the tiers themselves through
//! [`Retriever::hybrid_tier`], [`Retriever::keyword_tier`] and
//! [`Retriever::fulltext_tier`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use context_relay_core::error::Tier;
use context_relay_core::store::{DocumentStore, TextSearchProfile};
use context_relay_core::text::{normalize_query, query_tokens};
use context_relay_core::{Document, RelayError, Result, RetrievalResult};

use crate::config::{EmptyContentPolicy, RetrievalConfig};
use crate::rate_limit::RateLimiter;

pub const DEFAULT_MIN_RESULTS: usize = 3;
pub const DEFAULT_KEYWORD_TOKENS: usize = 3;

pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    limiter: Arc<RateLimiter>,
    min_results: usize,
    keyword_tokens: usize,
    empty_content: EmptyContentPolicy,
    timeout: Option<Duration>,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            min_results: DEFAULT_MIN_RESULTS,
            keyword_tokens: DEFAULT_KEYWORD_TOKENS,
            empty_content: EmptyContentPolicy::Abort,
            timeout: None,
        }
    }

    pub fn from_config(
        store: Arc<dyn DocumentStore>,
        limiter: Arc<RateLimiter>,
        config: &RetrievalConfig,
    ) -> Self {
        Self::new(store, limiter)
            .with_min_results(config.min_results)
            .with_keyword_tokens(config.keyword_tokens)
            .with_empty_content_policy(config.empty_content)
            .with_timeout(config.timeout())
    }

    pub fn with_min_results(mut self, min_results: usize) -> Self {
        self.min_results = min_results;
        self
    }

    pub fn with_keyword_tokens(mut self, keyword_tokens: usize) -> Self {
        self.keyword_tokens = keyword_tokens;
        self
    }

    pub fn with_empty_content_policy(mut self, policy: EmptyContentPolicy) -> Self {
        self.empty_content = policy;
        self
    }

    /// Deadline applied to every `retrieve` call; `None` is unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Threshold used when the caller does not pass one.
    pub fn min_results(&self) -> usize {
        self.min_results
    }

    /// Retrieve with an explicit threshold. `min_results == 0` runs only the hybrid tier.
    pub async fn retrieve(&self, query: &str, min_results: usize) -> Result<RetrievalResult> {
        self.retrieve_with_cancel(query, min_results, &CancellationToken::new())
            .await
    }

    /// Like [`retrieve`](Self::retrieve), aborting with [`RelayError::Cancelled`]
    /// as soon as `cancel` fires or the configured deadline passes.
    ///
    /// Cancellation drops every in-flight request of the current tier and
    /// no later tier is started.
    pub async fn retrieve_with_cancel(
        &self,
        query: &str,
        min_results: usize,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResult> {
        let query = normalize_query(query);
        let mut result = RetrievalResult::new();
        if query.is_empty() {
            return Ok(result);
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);

        let found = self.guarded(cancel, deadline, self.hybrid(&query)).await?;
        info!(
            found = found.len(),
            "Found {} relevant docs using hybrid search",
            found.len()
        );
        result.extend(found);
        if result.len() >= min_results {
            return Ok(result);
        }

        let found = self.guarded(cancel, deadline, self.keywords(&query)).await?;
        let added = result.extend(found);
        info!(added, total = result.len(), "keyword tier merged");
        if result.len() >= min_results {
            return Ok(result);
        }

        let found = self.guarded(cancel, deadline, self.fulltext(&query)).await?;
        info!(
            found = found.len(),
            "Found {} similar docs using full-text search",
            found.len()
        );
        result.extend(found);

        if result.len() < min_results {
            info!(
                total = result.len(),
                min_results, "retrieval finished below threshold"
            );
        }
        Ok(result)
    }

    /// Run only the whole-query hybrid tier.
    pub async fn hybrid_tier(&self, query: &str) -> Result<Vec<String>> {
        self.hybrid(&normalize_query(query)).await
    }

    /// Run only the per-token tier.
    pub async fn keyword_tier(&self, query: &str) -> Result<Vec<String>> {
        self.keywords(&normalize_query(query)).await
    }

    /// Run only the full-text fallback tier.
    pub async fn fulltext_tier(&self, query: &str) -> Result<Vec<String>> {
        self.fulltext(&normalize_query(query)).await
    }

    /// Contents of every document in `table`, subject to the empty-content policy.
    pub async fn all_documents(&self, table: &str) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        let docs = self
            .store
            .scan_all(table)
            .await
            .map_err(RelayError::store)?;
        self.contents(Tier::Scan, table, docs)
    }

    async fn hybrid(&self, query: &str) -> Result<Vec<String>> {
        self.hybrid_search(Tier::Hybrid, query).await
    }

    async fn keywords(&self, query: &str) -> Result<Vec<String>> {
        let tokens = query_tokens(query, self.keyword_tokens);
        let searches = tokens
            .iter()
            .map(|token| self.hybrid_search(Tier::Keyword, token));
        let per_token = try_join_all(searches).await?;
        Ok(per_token.into_iter().flatten().collect())
    }

    async fn fulltext(&self, query: &str) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        let docs = self
            .store
            .text_search(query, TextSearchProfile::WEB_ENGLISH)
            .await
            .map_err(RelayError::store)?;
        self.contents(Tier::FullText, query, docs)
    }

    async fn hybrid_search(&self, tier: Tier, query: &str) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        let docs = self
            .store
            .hybrid_search(query)
            .await
            .map_err(RelayError::store)?;
        if tier == Tier::Keyword {
            info!(
                found = docs.len(),
                "Found {} relevant docs for word: {}",
                docs.len(),
                query
            );
        }
        self.contents(tier, query, docs)
    }

    fn contents(&self, tier: Tier, query: &str, docs: Vec<Document>) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            if doc.has_content() {
                out.push(doc.content);
                continue;
            }
            match self.empty_content {
                EmptyContentPolicy::Abort => {
                    warn!(%tier, query, "backend returned a document with empty content");
                    return Err(RelayError::DataIntegrity {
                        tier,
                        query: query.to_string(),
                    });
                }
                EmptyContentPolicy::Skip => {
                    warn!(%tier, query, "skipping document with empty content");
                }
            }
        }
        Ok(out)
    }

    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        tier: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RelayError::Cancelled);
        }

        let expiry = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RelayError::Cancelled),
            _ = expiry => Err(RelayError::Cancelled),
            out = tier => out,
        }
    }
}
