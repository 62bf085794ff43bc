//! Core data models that flow through the indexing and retrieval pipelines.

use serde::{Deserialize, Serialize};

/// A fixed-length embedding vector produced by an [`Embedder`](crate::embedding::Embedder).
pub type Embedding = Vec<f32>;

/// A window of consecutive lines cut from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based index of the first line of the window.
    pub start_line: usize,
    pub source_lines: Vec<String>,
    /// `source_lines` joined with `\n`.
    pub text: String,
}

/// Metadata stored next to each vector. Everything a search result needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub file_path: String,
    pub content: String,
    pub session_id: String,
}

/// The unit of storage in a vector collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub id: String,
    pub embedding: Embedding,
    pub metadata: EntryMetadata,
}

/// Deterministic entry id for chunk `ordinal` of `file_path` in `session_id`.
///
/// Re-indexing the same file overwrites the entries at the same ordinals.
/// `%` and `_` inside the session and path are percent-encoded, so `_`
/// only ever appears as the separator and distinct inputs never share an id.
pub fn entry_id(session_id: &str, file_path: &str, ordinal: usize) -> String {
    format!(
        "{}_{}_{}",
        escape_id_component(session_id),
        escape_id_component(file_path),
        ordinal
    )
}

fn escape_id_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
    out
}

/// A ranked chunk returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub file_path: String,
    pub content: String,
    /// Relevance derived from the store distance; higher is better.
    pub score: f32,
}

/// Why an indexing request was accepted without doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The path looks like a package manager lock file.
    LockFile,
}

/// Outcome of [`Indexer::index_file`](crate::index::Indexer::index_file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { chunk_count: usize },
    Skipped(SkipReason),
}

impl IndexOutcome {
    pub fn chunk_count(&self) -> usize {
        match self {
            IndexOutcome::Indexed { chunk_count } => *chunk_count,
            IndexOutcome::Skipped(_) => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, IndexOutcome::Skipped(_))
    }
}
