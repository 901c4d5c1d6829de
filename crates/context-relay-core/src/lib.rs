//! # Context Relay Core
//!
//! Runtime-agnostic logic for Context Relay: the document model, the fault
//! taxonomy, the traits for every external backend (document store,
//! embedding provider, completion service, cache layer), query text
//! normalization, and prompt templates.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Concrete
//! backends and the retrieval runtime live in the `context-relay` crate.

pub mod cache;
pub mod completion;
pub mod embedding;
pub mod error;
pub mod models;
pub mod prompts;
pub mod store;
pub mod text;

pub use error::{RelayError, Result};
pub use models::{ContextualResponse, Document, Metadata, RetrievalResult};
