//! In-memory [`DocumentStore`] implementation for tests and embedded use.
//!
//! Documents live in a `Vec` behind `std::sync::RwLock`. Hybrid search
//! scores each document by query-word overlap and, when an embedding
//! provider is attached, brute-force cosine similarity against stored
//! vectors. Text search evaluates the parsed query against each
//! document's words in insertion order.

use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::models::{Document, Metadata};

use super::websearch::{self, WebQuery, WebTerm};
use super::{DocumentStore, QuerySyntax, TextSearchProfile, DOCUMENTS_TABLE};

const DEFAULT_MATCH_COUNT: usize = 10;

/// In-memory store holding a single `documents` table.
pub struct InMemoryStore {
    docs: RwLock<Vec<Document>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    alpha: f32,
    match_count: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
            embedder: None,
            alpha: 0.0,
            match_count: DEFAULT_MATCH_COUNT,
        }
    }

    /// Seed the store with bare content documents.
    pub fn from_contents<I, S>(contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut docs) = store.docs.write() {
            docs.extend(contents.into_iter().map(Document::from_content));
        }
        store
    }

    /// Attach an embedding provider so hybrid search also ranks by vector
    /// similarity, weighted `alpha` against word overlap.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>, alpha: f32) -> Self {
        self.embedder = Some(embedder);
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_match_count(mut self, match_count: usize) -> Self {
        self.match_count = match_count;
        self
    }

    /// Append a document verbatim, bypassing every check.
    pub fn push(&self, doc: Document) -> Result<()> {
        self.docs
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?
            .push(doc);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?
            .clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn word_overlap(query_words: &[String], doc_words: &[String]) -> f32 {
    if query_words.is_empty() {
        return 0.0;
    }
    let hits = query_words
        .iter()
        .filter(|q| doc_words.contains(q))
        .count();
    hits as f32 / query_words.len() as f32
}

fn plain_query(query: &str) -> WebQuery {
    let terms: Vec<WebTerm> = websearch::words(query)
        .into_iter()
        .map(|text| WebTerm {
            text,
            phrase: false,
            negated: false,
        })
        .collect();
    WebQuery {
        clauses: if terms.is_empty() { Vec::new() } else { vec![terms] },
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn hybrid_search(&self, query: &str) -> Result<Vec<Document>> {
        let mut query_words = websearch::words(query);
        query_words.sort();
        query_words.dedup();

        let query_vec = match &self.embedder {
            Some(embedder) => Some(embedder.embed(query).await?),
            None => None,
        };
        let alpha = if query_vec.is_some() { self.alpha } else { 0.0 };

        let mut scored: Vec<(f32, Document)> = self
            .snapshot()?
            .into_iter()
            .filter_map(|doc| {
                let keyword = word_overlap(&query_words, &websearch::words(&doc.content));
                let semantic = match (&query_vec, &doc.embedding) {
                    (Some(q), Some(d)) => cosine_similarity(q, d).max(0.0),
                    _ => 0.0,
                };
                let score = (1.0 - alpha) * keyword + alpha * semantic;
                (score > 0.0).then_some((score, doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.match_count);

        Ok(scored.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn text_search(&self, query: &str, profile: TextSearchProfile) -> Result<Vec<Document>> {
        let parsed = match profile.syntax {
            QuerySyntax::Plain => plain_query(query),
            QuerySyntax::WebSearch => websearch::parse(query),
        };
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|doc| websearch::matches(&parsed, &websearch::words(&doc.content)))
            .collect())
    }

    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<Document> {
        let doc = Document {
            id: Some(uuid::Uuid::new_v4().to_string()),
            content: content.to_string(),
            created_at: Some(chrono::Utc::now()),
            embedding: Some(embedding.to_vec()),
            metadata: metadata.cloned(),
        };
        self.push(doc.clone())?;
        Ok(doc)
    }

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>> {
        if table != DOCUMENTS_TABLE {
            bail!("unknown table: {}", table);
        }
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("pasta") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }
    }

    #[tokio::test]
    async fn test_hybrid_search_ranks_by_overlap() {
        let store = InMemoryStore::from_contents([
            "tomato soup recipe",
            "a good tomato recipe for soup",
            "car maintenance",
        ]);
        let results = store.hybrid_search("good tomato recipe").await.unwrap();
        let contents: Vec<&str> = results.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a good tomato recipe for soup", "tomato soup recipe"]);
    }

    #[tokio::test]
    async fn test_hybrid_search_uses_vectors_when_embedder_attached() {
        let store = InMemoryStore::new().with_embedder(Arc::new(AxisEmbedder), 1.0);
        store.insert("carbonara", &[1.0, 0.0], None).await.unwrap();
        store.insert("oil change", &[0.0, 1.0], None).await.unwrap();

        let results = store.hybrid_search("pasta").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "carbonara");
    }

    #[tokio::test]
    async fn test_hybrid_search_respects_match_count() {
        let store = InMemoryStore::from_contents(["rust a", "rust b", "rust c"]).with_match_count(2);
        assert_eq!(store.hybrid_search("rust").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_text_search_websearch_syntax() {
        let store = InMemoryStore::from_contents(["beef stew", "vegetable stew", "fruit salad"]);
        let results = store
            .text_search("stew -beef", TextSearchProfile::WEB_ENGLISH)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "vegetable stew");
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        let mut meta = Metadata::new();
        meta.insert("source".into(), serde_json::json!("test"));
        let doc = store.insert("hello", &[0.1, 0.2], Some(&meta)).await.unwrap();
        assert!(doc.id.is_some());
        assert!(doc.created_at.is_some());
        assert_eq!(doc.metadata, Some(meta));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_all_rejects_unknown_table() {
        let store = InMemoryStore::from_contents(["a"]);
        assert_eq!(store.scan_all(DOCUMENTS_TABLE).await.unwrap().len(), 1);
        assert!(store.scan_all("users").await.is_err());
    }
}
