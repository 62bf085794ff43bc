//! Retrieval pipeline: query → embed → session-filtered vector search → score.
//!
//! The store returns neighbours by ascending distance. Each distance is
//! mapped to a score with the [`ScoreTransform`] keyed to the store's
//! [`DistanceMetric`](crate::metric::DistanceMetric); built-in transforms
//! are decreasing, so the store's order is already the ranking. A custom
//! transform that is not monotonic forces a stable re-sort by score.
//!
//! Matches without a distance are dropped, as are matches whose metadata
//! belongs to another session (a store that ignored the filter must not
//! leak entries across sessions).

use std::sync::Arc;

use crate::embedding::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::metric::ScoreTransform;
use crate::models::SearchResult;
use crate::store::{SessionFilter, VectorStore};

pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    default_top_k: usize,
    transform: ScoreTransform,
}

impl Retriever {
    /// Retriever using the store's metric transform and `top_k = 5`.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        let transform = store.metric().score_transform();
        Self {
            store,
            embedder,
            default_top_k: DEFAULT_TOP_K,
            transform,
        }
    }

    /// # Errors
    ///
    /// [`Error::Configuration`] if `top_k == 0`.
    pub fn with_default_top_k(mut self, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::Configuration(
                "retrieval top_k must be >= 1".to_string(),
            ));
        }
        self.default_top_k = top_k;
        Ok(self)
    }

    /// Replace the metric's score transform.
    pub fn with_transform(mut self, transform: ScoreTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Search one session's indexed chunks.
    ///
    /// `top_k` falls back to the configured default when `None`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty session id or `top_k == 0`.
    /// - [`Error::StoreUnavailable`] if the store is not ready.
    /// - [`Error::SearchFailure`] wrapping an embedding or store failure.
    pub async fn search(
        &self,
        query: &str,
        session_id: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        if session_id.is_empty() {
            return Err(Error::InvalidInput("session id is required".to_string()));
        }
        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be >= 1".to_string()));
        }

        self.store.state().ensure_ready()?;

        let query_vec = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(Error::search)?;

        let matches = self
            .store
            .query(&query_vec, top_k, SessionFilter { session_id })
            .await
            .map_err(Error::search)?;

        let mut results = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(distance) = m.distance else {
                continue;
            };
            if m.metadata.session_id != session_id {
                tracing::warn!(
                    session_id,
                    entry_session = %m.metadata.session_id,
                    id = %m.id,
                    "dropping match from another session"
                );
                continue;
            }
            results.push(SearchResult {
                file_path: m.metadata.file_path,
                content: m.metadata.content,
                score: self.transform.score(distance),
            });
        }

        if !self.transform.monotonic {
            results.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        tracing::debug!(session_id, results = results.len(), "search complete");
        Ok(results)
    }
}
