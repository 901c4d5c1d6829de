//! Core data models that flow through the retrieval and response pipeline.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Opaque key/value metadata attached to an ingested document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document as returned by a [`DocumentStore`](crate::store::DocumentStore).
///
/// `content` is never empty once a document enters the pipeline. A backend
/// that returns an empty `content` is reporting corrupt data, which the
/// retrieval runtime treats as a data-integrity fault rather than as an
/// empty result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Never serialized; a full vector is thousands of floats.
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// A bare document carrying only content, as most search backends return it.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            created_at: None,
            embedding: None,
            metadata: None,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Distinct document contents, ordered by first arrival.
///
/// Identity is exact string equality. Inserting a content string that is
/// already present is a no-op, so the sequence never holds two equal
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalResult {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl RetrievalResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `content` unless an equal string is already present.
    ///
    /// Returns `true` when the content was new.
    pub fn insert(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.seen.contains(&content) {
            return false;
        }
        self.seen.insert(content.clone());
        self.items.push(content);
        true
    }

    /// Merge a batch of contents in order, returning how many were new.
    pub fn extend<I, S>(&mut self, contents: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for content in contents {
            if self.insert(content) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, content: &str) -> bool {
        self.seen.contains(content)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

impl<S: Into<String>> FromIterator<S> for RetrievalResult {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl IntoIterator for RetrievalResult {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for RetrievalResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// The answer produced for one user input, together with the documents
/// it was conditioned on. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ContextualResponse {
    pub answer: String,
    pub sources: RetrievalResult,
}
