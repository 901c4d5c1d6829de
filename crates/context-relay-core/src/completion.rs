//! Completion service trait.
//!
//! One service answers two kinds of request: a bare prompt (used for
//! auxiliary tasks such as keyword extraction) and a user query paired with
//! retrieved documents (the final contextual answer).

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate text for a fully rendered prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Answer `query` using `documents` as supporting context.
    async fn complete_with_context(&self, query: &str, documents: &[String]) -> Result<String>;
}
