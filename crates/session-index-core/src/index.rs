//! Indexing pipeline: chunk → embed → upsert for one file revision.
//!
//! # Pipeline
//!
//! ```text
//! (session, path, content)
//!   → lock-file guard ──▶ Skipped
//!   → store readiness check
//!   → chunk_text (line windows, blank windows dropped)
//!   → embed_texts (batched; any failure abandons the file)
//!   → VectorStore::upsert (one call for the whole file)
//!   → purge ids of the previous revision beyond the new chunk count
//! ```
//!
//! Nothing is written before every chunk has an embedding, so a failed
//! model call never leaves a half-embedded revision in the store.
//!
//! Entry ids are `"{session}_{path}_{ordinal}"`. Concurrent re-indexing of
//! the same file converges on the same final state regardless of
//! completion order, because every write is an idempotent upsert by id.

use std::collections::HashSet;
use std::sync::Arc;

use crate::chunk::{chunk_text, ChunkingConfig};
use crate::embedding::{embed_texts, Embedder};
use crate::error::{Error, Result};
use crate::models::{entry_id, EntryMetadata, IndexOutcome, IndexedEntry, SkipReason};
use crate::store::VectorStore;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Tuning for [`Indexer`], decoupled from application config.
#[derive(Debug, Clone)]
pub struct IndexParams {
    pub chunking: ChunkingConfig,
    /// Maximum number of chunks sent to the embedder per call.
    pub batch_size: usize,
    /// Delete trailing entries left over from a longer previous revision.
    pub purge_stale_chunks: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            purge_stale_chunks: true,
        }
    }
}

/// Whether `path` looks like a lock file (`package-lock.json`,
/// `pnpm-lock.yaml`, …).
///
/// True when the first occurrence of `-lock` starts after the first byte.
pub fn is_lock_file(path: &str) -> bool {
    matches!(path.find("-lock"), Some(pos) if pos > 0)
}

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    params: IndexParams,
}

impl Indexer {
    /// # Errors
    ///
    /// [`Error::Configuration`] if `params.batch_size == 0`.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        params: IndexParams,
    ) -> Result<Self> {
        if params.batch_size == 0 {
            return Err(Error::Configuration(
                "indexing batch_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            store,
            embedder,
            params,
        })
    }

    /// Index one revision of a virtual file for a session.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty session id or path.
    /// - [`Error::StoreUnavailable`] if the store is not ready (checked
    ///   before any chunking or embedding).
    /// - [`Error::IndexingFailure`] wrapping the embedding or store error
    ///   that aborted this file.
    pub async fn index_file(
        &self,
        file_path: &str,
        content: &str,
        session_id: &str,
    ) -> Result<IndexOutcome> {
        if session_id.is_empty() {
            return Err(Error::InvalidInput("session id is required".to_string()));
        }
        if file_path.is_empty() {
            return Err(Error::InvalidInput("file path is required".to_string()));
        }

        if is_lock_file(file_path) {
            tracing::info!(session_id, file_path, "skipping lock file");
            return Ok(IndexOutcome::Skipped(SkipReason::LockFile));
        }

        self.store.state().ensure_ready()?;

        let chunks = chunk_text(content, &self.params.chunking);
        if chunks.is_empty() {
            tracing::info!(session_id, file_path, "no non-empty chunks, nothing to index");
            if self.params.purge_stale_chunks {
                let stale = self
                    .store
                    .ids_for_file(session_id, file_path)
                    .await
                    .map_err(|e| Error::indexing(file_path, e))?;
                self.store
                    .delete(&stale)
                    .await
                    .map_err(|e| Error::indexing(file_path, e))?;
            }
            return Ok(IndexOutcome::Indexed { chunk_count: 0 });
        }

        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.params.batch_size) {
            let vectors = embed_texts(self.embedder.as_ref(), batch)
                .await
                .map_err(|e| Error::indexing(file_path, e))?;
            embeddings.extend(vectors);
        }

        let entries: Vec<IndexedEntry> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (content, embedding))| IndexedEntry {
                id: entry_id(session_id, file_path, ordinal),
                embedding,
                metadata: EntryMetadata {
                    file_path: file_path.to_string(),
                    content,
                    session_id: session_id.to_string(),
                },
            })
            .collect();
        let chunk_count = entries.len();

        let previous_ids = if self.params.purge_stale_chunks {
            self.store
                .ids_for_file(session_id, file_path)
                .await
                .map_err(|e| Error::indexing(file_path, e))?
        } else {
            Vec::new()
        };

        self.store
            .upsert(&entries)
            .await
            .map_err(|e| Error::indexing(file_path, e))?;

        if self.params.purge_stale_chunks {
            let current: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
            let stale: Vec<String> = previous_ids
                .into_iter()
                .filter(|id| !current.contains(id.as_str()))
                .collect();
            if !stale.is_empty() {
                tracing::debug!(session_id, file_path, stale = stale.len(), "purging stale chunks");
                self.store
                    .delete(&stale)
                    .await
                    .map_err(|e| Error::indexing(file_path, e))?;
            }
        }

        tracing::info!(
            session_id,
            file_path,
            chunks = chunk_count,
            model = self.embedder.model_name(),
            "indexed virtual file"
        );

        Ok(IndexOutcome::Indexed { chunk_count })
    }
}
