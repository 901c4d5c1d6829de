//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is everything the retrieval runtime and the
//! ingestion path need from a storage backend, enabling pluggable backends
//! (SQLite, in-memory, a hosted vector database).
//!
//! Implementations must be `Send + Sync`: one client instance is shared by
//! every concurrent search. Each call is independently atomic at the
//! backend; no transaction spans two calls.
//!
//! Every method returns a closed `Result`: `Ok` with a (possibly empty)
//! sequence of documents, or `Err` describing the backend failure. An empty
//! sequence means "nothing matched" and is never an error.

pub mod memory;
pub mod websearch;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, Metadata};

/// Name of the table that holds ingested documents.
pub const DOCUMENTS_TABLE: &str = "documents";

/// How a full-text query string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// Every word must match.
    Plain,
    /// Web-search style: quoted phrases, `or` alternatives, `-term` exclusion.
    WebSearch,
}

/// Query syntax plus the language profile used for stemming and stop words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSearchProfile {
    pub syntax: QuerySyntax,
    pub language: &'static str,
}

impl TextSearchProfile {
    /// Web-search syntax over the English profile, used by the full-text tier.
    pub const WEB_ENGLISH: TextSearchProfile = TextSearchProfile {
        syntax: QuerySyntax::WebSearch,
        language: "english",
    };
}

/// Abstract storage backend for Context Relay.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`hybrid_search`](DocumentStore::hybrid_search) | Vector + lexical search in one call |
/// | [`text_search`](DocumentStore::text_search) | Lexical full-text search |
/// | [`insert`](DocumentStore::insert) | Store content with its embedding |
/// | [`scan_all`](DocumentStore::scan_all) | Read every document of a table |
///
/// Search results come back in the backend's own relevance order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Combined vector-similarity and lexical search for `query`.
    async fn hybrid_search(&self, query: &str) -> Result<Vec<Document>>;

    /// Lexical full-text search interpreted under `profile`.
    async fn text_search(&self, query: &str, profile: TextSearchProfile) -> Result<Vec<Document>>;

    /// Insert `content` with its embedding vector, returning the stored document.
    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<Document>;

    /// Every document in `table`.
    async fn scan_all(&self, table: &str) -> Result<Vec<Document>>;
}
