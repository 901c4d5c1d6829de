//! Fault taxonomy shared by every Context Relay component.
//!
//! Backend traits return `anyhow::Result`; the runtime wraps a failed
//! backend call into the matching variant here so callers can tell a
//! store outage from corrupt data from a caller-requested abort.

use thiserror::Error;

/// Boxed backend error kept as the `source` of a wrapping fault.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Search strategy that produced a fault, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Whole-query hybrid search.
    Hybrid,
    /// Per-token hybrid search.
    Keyword,
    /// Lexical full-text fallback.
    FullText,
    /// Bulk table scan outside the escalation tiers.
    Scan,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Hybrid => "hybrid",
            Tier::Keyword => "keyword",
            Tier::FullText => "full-text",
            Tier::Scan => "scan",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed caller input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A backend returned a document with empty content.
    #[error("{tier} search for '{query}' returned a document with empty content")]
    DataIntegrity { tier: Tier, query: String },

    #[error("document store call failed: {0}")]
    Store(#[source] BoxError),

    /// An embedding provider call failed. Ingestion reports it as the
    /// source of an [`RelayError::Ingestion`] fault; a store that embeds
    /// queries itself reports it inside [`RelayError::Store`].
    #[error("embedding provider call failed: {0}")]
    Provider(#[source] BoxError),

    #[error("completion service call failed: {0}")]
    Completion(#[source] BoxError),

    /// Embed-then-insert failed; carries the content that was not stored.
    #[error("failed to ingest content '{}': {source}", preview(.content))]
    Ingestion {
        content: String,
        #[source]
        source: BoxError,
    },

    /// The caller cancelled the operation or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,
}

impl RelayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RelayError::Validation(msg.into())
    }

    pub fn store(err: impl Into<BoxError>) -> Self {
        RelayError::Store(err.into())
    }

    pub fn provider(err: impl Into<BoxError>) -> Self {
        RelayError::Provider(err.into())
    }

    pub fn completion(err: impl Into<BoxError>) -> Self {
        RelayError::Completion(err.into())
    }

    /// Stable machine-readable code used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "bad_request",
            RelayError::DataIntegrity { .. } => "data_integrity",
            RelayError::Store(_) | RelayError::Provider(_) | RelayError::Completion(_) => {
                "backend"
            }
            RelayError::Ingestion { .. } => "ingestion",
            RelayError::Cancelled => "timeout",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

fn preview(content: &str) -> String {
    const MAX_CHARS: usize = 48;
    if content.chars().count() <= MAX_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_CHARS).collect();
    format!("{}…", head)
}
