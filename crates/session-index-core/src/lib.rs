//! # Session Index Core
//!
//! Runtime-agnostic logic for Session Index: data models, the error
//! taxonomy, line-window chunking, the embedder and vector store traits,
//! and the indexing and retrieval pipelines built on top of them.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Concrete embedders and persistent stores live in the `session-index`
//! application crate and are injected as trait objects.
//!
//! ```text
//!  file change ──▶ Indexer ──chunk──▶ embed ──▶ VectorStore::upsert
//!  query ────────▶ Retriever ──embed──▶ VectorStore::query ──▶ score
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod metric;
pub mod models;
pub mod search;
pub mod store;

pub use error::{Error, Result};
pub use index::Indexer;
pub use models::{Chunk, Embedding, EntryMetadata, IndexOutcome, IndexedEntry, SearchResult};
pub use search::Retriever;
