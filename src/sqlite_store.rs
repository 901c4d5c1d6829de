//! SQLite-backed [`DocumentStore`] implementation.
//!
//! # Hybrid Scoring
//!
//! 1. Fetch up to `match_count` FTS5 candidates (BM25 rank) for the query words.
//! 2. Embed the query and score every stored vector by cosine similarity,
//!    keeping the best `match_count`.
//! 3. Normalize both sets to `[0, 1]` using min-max normalization.
//! 4. Merge: `score = (1 - α) × keyword + α × semantic`.
//! 5. Sort by score (desc), created_at (asc), id (asc) and truncate.
//!
//! Without an embedding provider the semantic side is empty and results
//! are ranked by BM25 alone.
//!
//! # Full-text Search
//!
//! Web-search queries are translated into FTS5 syntax: each alternative
//! becomes a parenthesized `AND` of quoted terms, exclusions are appended
//! with `NOT`, and alternatives are joined with `OR`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use context_relay_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use context_relay_core::store::websearch::{self, WebQuery, WebTerm};
use context_relay_core::store::{DocumentStore, QuerySyntax, TextSearchProfile, DOCUMENTS_TABLE};
use context_relay_core::{Document, Metadata, RelayError};

pub const DEFAULT_HYBRID_ALPHA: f64 = 0.6;
pub const DEFAULT_MATCH_COUNT: i64 = 10;

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    alpha: f64,
    match_count: i64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            embedder: None,
            alpha: DEFAULT_HYBRID_ALPHA,
            match_count: DEFAULT_MATCH_COUNT,
        }
    }

    /// Enable the semantic half of hybrid search.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_match_count(mut self, match_count: i64) -> Self {
        self.match_count = match_count;
        self
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn keyword_candidates(&self, fts_query: &str) -> Result<Vec<Candidate>> {
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT doc_id, rank
            FROM documents_fts
            WHERE documents_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(fts_query)
        .bind(self.match_count)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                Candidate {
                    id: row.get("doc_id"),
                    raw_score: -rank,
                }
            })
            .collect())
    }

    async fn vector_candidates(&self, query_vec: &[f32]) -> Result<Vec<Candidate>> {
        let rows = sqlx::query("SELECT id, embedding FROM documents WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut candidates: Vec<Candidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Candidate {
                    id: row.get("id"),
                    raw_score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.match_count.max(0) as usize);
        Ok(candidates)
    }

    async fn fetch_documents(&self, ids: &[String]) -> Result<HashMap<String, Document>> {
        let mut docs = HashMap::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query(
                "SELECT id, content, embedding, metadata_json, created_at FROM documents WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                docs.insert(id.clone(), row_to_document(&row)?);
            }
        }
        Ok(docs)
    }
}

struct Candidate {
    id: String,
    raw_score: f64,
}

/// Min-max normalize raw scores to `[0, 1]`; a single distinct score maps to 1.0.
fn normalize_scores(candidates: &[Candidate]) -> HashMap<&str, f64> {
    if candidates.is_empty() {
        return HashMap::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            let norm = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            (c.id.as_str(), norm)
        })
        .collect()
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let embedding: Option<Vec<u8>> = row.get("embedding");
    let metadata_json: Option<String> = row.get("metadata_json");
    let created_at: i64 = row.get("created_at");

    let metadata = match metadata_json {
        Some(json) => Some(
            serde_json::from_str::<Metadata>(&json).context("Corrupt metadata_json column")?,
        ),
        None => None,
    };

    Ok(Document {
        id: Some(row.get("id")),
        content: row.get("content"),
        created_at: chrono::DateTime::from_timestamp(created_at, 0),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        metadata,
    })
}

fn quote(term: &WebTerm) -> String {
    format!("\"{}\"", term.text)
}

/// Translate a parsed web-search query into an FTS5 MATCH expression.
///
/// Returns an empty string when nothing positive is left to match.
fn to_fts5(query: &WebQuery) -> String {
    let clauses: Vec<String> = query
        .clauses
        .iter()
        .filter_map(|clause| {
            let positive: Vec<String> = clause.iter().filter(|t| !t.negated).map(quote).collect();
            if positive.is_empty() {
                return None;
            }
            let mut expr = positive.join(" AND ");
            for term in clause.iter().filter(|t| t.negated) {
                expr = format!("{} NOT {}", expr, quote(term));
            }
            Some(format!("({})", expr))
        })
        .collect();
    clauses.join(" OR ")
}

/// Any query word may match; BM25 decides the order.
fn any_word(query: &str) -> String {
    websearch::words(query)
        .iter()
        .map(|w| format!("\"{}\"", w))
        .collect::<Vec<_>>()
        .join(" OR ")
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
        clauses: vec![terms],
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn hybrid_search(&self, query: &str) -> Result<Vec<Document>> {
        let keyword = self.keyword_candidates(&any_word(query)).await?;
        let vector = match &self.embedder {
            Some(embedder) => {
                let query_vec = embedder.embed(query).await.map_err(RelayError::provider)?;
                self.vector_candidates(&query_vec).await?
            }
            None => Vec::new(),
        };
        if keyword.is_empty() && vector.is_empty() {
            return Ok(Vec::new());
        }

        let alpha = if self.embedder.is_some() { self.alpha } else { 0.0 };
        let kw_map = normalize_scores(&keyword);
        let vec_map = normalize_scores(&vector);

        let mut ids: Vec<String> = Vec::new();
        for c in keyword.iter().chain(vector.iter()) {
            if !ids.contains(&c.id) {
                ids.push(c.id.clone());
            }
        }
        let docs = self.fetch_documents(&ids).await?;

        let mut scored: Vec<(f64, Document)> = ids
            .iter()
            .filter_map(|id| {
                let k = kw_map.get(id.as_str()).copied().unwrap_or(0.0);
                let v = vec_map.get(id.as_str()).copied().unwrap_or(0.0);
                let doc = docs.get(id)?.clone();
                Some(((1.0 - alpha) * k + alpha * v, doc))
            })
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(self.match_count.max(0) as usize);

        Ok(scored.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn text_search(&self, query: &str, profile: TextSearchProfile) -> Result<Vec<Document>> {
        if profile.language != "english" {
            bail!(
                "Unsupported text search language '{}': the index is built with the English stemmer",
                profile.language
            );
        }
        let parsed = match profile.syntax {
            QuerySyntax::WebSearch => websearch::parse(query),
            QuerySyntax::Plain => plain_query(query),
        };
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT d.id, d.content, d.embedding, d.metadata_json, d.created_at
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.doc_id
            WHERE documents_fts MATCH ?
            ORDER BY documents_fts.rank
            LIMIT ?
            "#,
        )
        .bind(to_fts5(&parsed))
        .bind(self.match_count)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: Option<&Metadata>,
    ) -> Result<Document> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (id, content, embedding, metadata_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(content)
        .bind(vec_to_blob(embedding))
        .bind(&metadata_json)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO documents_fts (doc_id, content) VALUES (?, ?)")
            .bind(&id)
            .bind(content)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Document {
            id: Some(id),
            content: content.to_string(),
            created_at: chrono::DateTime::from_timestamp(now.timestamp(), 0),
            embedding: Some(embedding.to_vec()),
            metadata: metadata.cloned(),
        })
    }

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>> {
        if table != DOCUMENTS_TABLE {
            bail!("Unknown table: {}", table);
        }
        let rows = sqlx::query(
            "SELECT id, content, embedding, metadata_json, created_at FROM documents ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::run_migrations;

    /// Two-axis embedder: "rust" and "python" pull vectors apart.
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
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("rust") { 1.0 } else { 0.0 },
                if text.contains("python") { 1.0 } else { 0.0 },
            ])
        }
    }

    async fn store(dir: &tempfile::TempDir) -> SqliteStore {
        let pool = db::connect(&dir.path().join("relay.sqlite")).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    async fn seed(store: &SqliteStore, contents: &[&str]) {
        for content in contents {
            let vec = AxisEmbedder.embed(content).await.unwrap();
            store.insert(content, &vec, None).await.unwrap();
        }
    }

    #[test]
    fn test_to_fts5_translation() {
        let q = websearch::parse("\"borrow checker\" rust -python or tokio");
        assert_eq!(
            to_fts5(&q),
            "(\"borrow checker\" AND \"rust\" NOT \"python\") OR (\"tokio\")"
        );
        assert_eq!(to_fts5(&websearch::parse("-python")), "");
    }

    #[tokio::test]
    async fn test_insert_then_scan_roundtrips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), serde_json::json!("notes"));

        let doc = store
            .insert("ownership rules", &[0.5, 0.5], Some(&metadata))
            .await
            .unwrap();
        assert!(doc.id.is_some());

        let all = store.scan_all(DOCUMENTS_TABLE).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "ownership rules");
        assert_eq!(all[0].embedding.as_deref(), Some(&[0.5f32, 0.5][..]));
        assert_eq!(all[0].metadata.as_ref().unwrap()["source"], "notes");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_unknown_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        assert!(store.scan_all("profiles").await.is_err());
    }

    #[tokio::test]
    async fn test_text_search_web_syntax_with_stemming() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        seed(
            &store,
            &[
                "Rust programs compile to native code",
                "Python programs are interpreted",
                "Compiling Rust with cargo",
            ],
        )
        .await;

        let hits = store
            .text_search("compiled -python", TextSearchProfile::WEB_ENGLISH)
            .await
            .unwrap();
        let contents: Vec<&str> = hits.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents.len(), 2);
        assert!(contents.contains(&"Rust programs compile to native code"));
        assert!(contents.contains(&"Compiling Rust with cargo"));

        let none = store
            .text_search("haskell", TextSearchProfile::WEB_ENGLISH)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_search_ranks_semantic_match_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await.with_embedder(Arc::new(AxisEmbedder));
        seed(
            &store,
            &["Rust ownership and borrowing", "Python list comprehensions"],
        )
        .await;

        let hits = store.hybrid_search("rust ownership").await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].content, "Rust ownership and borrowing");
    }

    #[tokio::test]
    async fn test_hybrid_search_without_embedder_uses_bm25() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        seed(&store, &["tokio runtime internals", "serde derive macros"]).await;

        let hits = store.hybrid_search("tokio").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "tokio runtime internals");

        assert!(store.hybrid_search("   ").await.unwrap().is_empty());
    }

    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        fn model_name(&self) -> &str {
            "down"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("embedding endpoint unreachable")
        }
    }

    #[tokio::test]
    async fn test_query_embed_failure_is_provider_fault() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await.with_embedder(Arc::new(DownEmbedder));

        let err = store.hybrid_search("rust").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RelayError>(),
            Some(RelayError::Provider(_))
        ));
        assert!(format!("{:#}", err).contains("unreachable"));
    }

    #[test]
    fn test_normalize_scores_single_value() {
        let c = vec![Candidate {
            id: "a".into(),
            raw_score: 3.2,
        }];
        let norm = normalize_scores(&c);
        assert_eq!(norm["a"], 1.0);
    }
}
