//! Cache invalidation signal exposed to external cache layers.

/// Tag grouping every cached retrieval over the document index.
pub const DOCUMENT_INDEX_TAG: &str = "document-index";

/// Tag grouping every cached completion.
pub const COMPLETION_CACHE_TAG: &str = "completion-cache";

/// Tags invalidated at the start of every contextual answer.
pub const ANSWER_TAGS: [&str; 2] = [DOCUMENT_INDEX_TAG, COMPLETION_CACHE_TAG];

/// Receiver of cache invalidation signals.
///
/// After `invalidate(tag)` returns, downstream consumers must treat every
/// entry previously cached under `tag` as stale.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, tag: &str);
}

/// Invalidator for deployments without a cache layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _tag: &str) {}
}
