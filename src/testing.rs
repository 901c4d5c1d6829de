//! Instrumented backend doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use context_relay_core::cache::CacheInvalidator;
use context_relay_core::completion::CompletionService;
use context_relay_core::embedding::EmbeddingProvider;
use context_relay_core::store::{DocumentStore, TextSearchProfile};
use context_relay_core::{Document, Metadata};

fn docs(contents: &[&str]) -> Vec<Document> {
    contents.iter().map(|c| Document::from_content(*c)).collect()
}

/// Store whose answers are scripted per query string.
#[derive(Default)]
pub struct ScriptedStore {
    hybrid: HashMap<String, Vec<Document>>,
    text: HashMap<String, Vec<Document>>,
    scan: HashMap<String, Vec<Document>>,
    failing_hybrid: Vec<String>,
    fail_insert: bool,
    delay: Option<Duration>,
    pub hybrid_queries: Mutex<Vec<String>>,
    pub text_queries: Mutex<Vec<String>>,
    pub inserts: Mutex<Vec<(String, Vec<f32>)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hybrid(mut self, query: &str, contents: &[&str]) -> Self {
        self.hybrid.insert(query.to_string(), docs(contents));
        self
    }

    pub fn text(mut self, query: &str, contents: &[&str]) -> Self {
        self.text.insert(query.to_string(), docs(contents));
        self
    }

    /// Rows returned by `scan_all(table)`.
    pub fn scan(mut self, table: &str, contents: &[&str]) -> Self {
        self.scan.insert(table.to_string(), docs(contents));
        self
    }

    pub fn failing_hybrid(mut self, query: &str) -> Self {
        self.failing_hybrid.push(query.to_string());
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// Every search sleeps this long on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn hybrid_calls(&self) -> Vec<String> {
        self.hybrid_queries.lock().unwrap().clone()
    }

    pub fn text_calls(&self) -> Vec<String> {
        self.text_queries.lock().unwrap().clone()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    async fn pause(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn hybrid_search(&self, query: &str) -> Result<Vec<Document>> {
        self.hybrid_queries.lock().unwrap().push(query.to_string());
        self.pause().await;
        if self.failing_hybrid.iter().any(|q| q == query) {
            bail!("hybrid search unavailable");
        }
        Ok(self.hybrid.get(query).cloned().unwrap_or_default())
    }

    async fn text_search(&self, query: &str, _profile: TextSearchProfile) -> Result<Vec<Document>> {
        self.text_queries.lock().unwrap().push(query.to_string());
        self.pause().await;
        Ok(self.text.get(query).cloned().unwrap_or_default())
    }

    async fn insert(
        &self,
        content: &str,
        embedding: &[f32],
        _metadata: Option<&Metadata>,
    ) -> Result<Document> {
        self.inserts
            .lock()
            .unwrap()
            .push((content.to_string(), embedding.to_vec()));
        if self.fail_insert {
            bail!("insert rejected");
        }
        Ok(Document::from_content(content))
    }

    async fn scan_all(&self, table: &str) -> Result<Vec<Document>> {
        Ok(self.scan.get(table).cloned().unwrap_or_default())
    }
}

/// Embedder returning a fixed vector and counting calls.
#[derive(Default)]
pub struct CountingEmbedder {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model_name(&self) -> &str {
        "counting"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("embedding endpoint timed out"));
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Completion double that replays a canned response and records inputs.
#[derive(Default)]
pub struct ScriptedCompletion {
    pub response: String,
    pub fail: bool,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
    pub contextual: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedCompletion {
    pub fn replying(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Contextual completions sleep this long on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            bail!("completion quota exceeded");
        }
        Ok(self.response.clone())
    }

    async fn complete_with_context(&self, query: &str, documents: &[String]) -> Result<String> {
        self.contextual
            .lock()
            .unwrap()
            .push((query.to_string(), documents.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            bail!("completion quota exceeded");
        }
        Ok(self.response.clone())
    }
}

/// Invalidator that remembers every tag it was handed.
#[derive(Default)]
pub struct RecordingInvalidator {
    pub tags: Mutex<Vec<String>>,
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate(&self, tag: &str) {
        self.tags.lock().unwrap().push(tag.to_string());
    }
}
