//! # Context Relay
//!
//! Multi-tier document retrieval and contextual answers for
//! retrieval-augmented generation.
//!
//! A query is answered from a document store by escalating through three
//! search tiers until enough distinct documents are found, every store call
//! passing through one shared rate limiter. The retrieved documents are
//! handed to a completion service to produce an answer.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!  input ───▶│  Responder   │── invalidate tags ──▶ TagRegistry
//!            └──────┬───────┘
//!                   ▼
//!            ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//!            │  Retriever   │──▶│ RateLimiter │──▶│ DocumentStore│
//!            │ hybrid ▸ kw  │   └─────────────┘   │ SQLite FTS5  │
//!            │ ▸ full-text  │                     │  + vectors   │
//!            └──────┬───────┘                     └──────────────┘
//!                   ▼
//!            ┌──────────────┐
//!            │  Completion  │──▶ { answer, sources }
//!            └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! relay init
//! relay ingest "Rust guarantees memory safety without a garbage collector."
//! relay retrieve "memory safety"
//! relay ask "How does Rust manage memory?"
//! relay serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`retrieval`] | Three-tier retrieval orchestrator |
//! | [`rate_limit`] | Fixed-window limiter shared by all store calls |
//! | [`ingest`] | Embed-and-store ingestion |
//! | [`keywords`] | Keyword extraction through the completion service |
//! | [`answer`] | Contextual response assembly |
//! | [`cache`] | Cache tag registry |
//! | [`sqlite_store`] | SQLite document store (FTS5 + vectors) |
//! | [`embedding`] | Embedding providers |
//! | [`completion`] | Completion providers |
//! | [`relay`] | Component wiring |
//! | [`server`] | HTTP server |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod cache;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod keywords;
pub mod migrate;
pub mod rate_limit;
pub mod relay;
pub mod retrieval;
pub mod server;
pub mod sqlite_store;

#[cfg(test)]
mod testing;

pub use context_relay_core::{
    ContextualResponse, Document, Metadata, RelayError, Result, RetrievalResult,
};
