use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use context_relay::config::Config;
use context_relay::relay::Relay;
use context_relay::RelayError;
use context_relay_core::cache::{COMPLETION_CACHE_TAG, DOCUMENT_INDEX_TAG};
use context_relay_core::completion::CompletionService;
use context_relay_core::embedding::EmbeddingProvider;
use context_relay_core::store::memory::InMemoryStore;
use context_relay_core::store::DOCUMENTS_TABLE;
use context_relay_core::Document;

const DOCS: [&str; 4] = [
    "rust ownership and borrowing",
    "async rust with tokio",
    "python asyncio event loop",
    "rust macros by example",
];

/// Embeds by keyword presence along fixed axes.
struct AxisEmbedder;

#[async_trait]
impl EmbeddingProvider for AxisEmbedder {
    fn model_name(&self) -> &str {
        "axis"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(["rust", "python", "tokio"]
            .iter()
            .map(|axis| if text.contains(axis) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Answers with the number of documents it was given and records the query.
#[derive(Default)]
struct CountingCompletion {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionService for CountingCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok("rust, tokio".to_string())
    }

    async fn complete_with_context(&self, query: &str, documents: &[String]) -> Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        if documents.is_empty() {
            bail!("no context");
        }
        Ok(format!("answered from {} documents", documents.len()))
    }
}

fn config(extra: &str) -> Config {
    toml::from_str(&format!("[db]\npath = \"unused.sqlite\"\n{}", extra)).unwrap()
}

fn relay_over(store: InMemoryStore, extra: &str) -> (Relay, Arc<CountingCompletion>) {
    let completion = Arc::new(CountingCompletion::default());
    let relay = Relay::assemble(
        &config(extra),
        Arc::new(store),
        Arc::new(AxisEmbedder),
        completion.clone(),
    );
    (relay, completion)
}

#[tokio::test]
async fn test_keyword_tier_fills_up_a_narrow_hybrid_tier() {
    let store = InMemoryStore::from_contents(DOCS).with_match_count(1);
    let (relay, _) = relay_over(store, "");

    let result = relay
        .retriever
        .retrieve("rust tokio macros", 3)
        .await
        .unwrap();

    assert_eq!(
        result.into_vec(),
        vec![
            "async rust with tokio",
            "rust ownership and borrowing",
            "rust macros by example",
        ]
    );
}

#[tokio::test]
async fn test_short_result_is_not_an_error() {
    let store = InMemoryStore::from_contents(DOCS).with_match_count(1);
    let (relay, _) = relay_over(store, "");

    let result = relay
        .retriever
        .retrieve("rust tokio macros", 10)
        .await
        .unwrap();
    assert_eq!(result.len(), 3);
}

#[tokio::test]
async fn test_ingested_document_is_retrievable() {
    let store = InMemoryStore::new().with_embedder(Arc::new(AxisEmbedder), 0.5);
    let (relay, _) = relay_over(store, "");

    let doc = relay
        .ingestor
        .store_embedding("tokio schedules tasks cooperatively", None)
        .await
        .unwrap();
    assert!(doc.id.is_some());
    assert_eq!(doc.embedding.as_deref(), Some(&[0.0f32, 0.0, 1.0][..]));

    let result = relay.retriever.retrieve("tokio", 1).await.unwrap();
    assert_eq!(result.as_slice(), &["tokio schedules tasks cooperatively"]);
}

#[tokio::test]
async fn test_answer_uses_normalized_input_and_bumps_tags() {
    let store = InMemoryStore::from_contents(DOCS);
    let (relay, completion) = relay_over(store, "");

    let response = relay.responder.answer("  rust\r\ntokio  ").await.unwrap();

    assert_eq!(response.answer, "answered from 3 documents");
    assert_eq!(response.sources.len(), 3);
    assert_eq!(*completion.queries.lock().unwrap(), vec!["rust tokio"]);
    assert_eq!(relay.tags.generation(DOCUMENT_INDEX_TAG), 1);
    assert_eq!(relay.tags.generation(COMPLETION_CACHE_TAG), 1);
}

#[tokio::test]
async fn test_answer_respects_input_word_limit() {
    let store = InMemoryStore::from_contents(DOCS);
    let (relay, completion) = relay_over(store, "[completion]\nmax_input_words = 2\n");

    let err = relay
        .responder
        .answer("rust tokio macros")
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Validation(_)));
    assert!(completion.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_scan_honors_empty_content_policy() {
    let abort_store = InMemoryStore::from_contents(DOCS);
    abort_store.push(Document::from_content("")).unwrap();
    let (relay, _) = relay_over(abort_store, "");
    let err = relay
        .retriever
        .all_documents(DOCUMENTS_TABLE)
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::DataIntegrity { .. }));

    let skip_store = InMemoryStore::from_contents(DOCS);
    skip_store.push(Document::from_content("")).unwrap();
    let (relay, _) = relay_over(skip_store, "[retrieval]\nempty_content = \"skip\"\n");
    let all = relay.retriever.all_documents(DOCUMENTS_TABLE).await.unwrap();
    assert_eq!(all, DOCS.to_vec());
}

#[tokio::test]
async fn test_keyword_extraction_through_relay() {
    let (relay, _) = relay_over(InMemoryStore::new(), "");
    let keywords = relay.keywords.extract_keywords("anything").await.unwrap();
    assert_eq!(keywords, vec!["rust", "tokio"]);
}
