//! In-memory [`VectorStore`] for tests, the CLI, and single-process use.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Upserting an existing id replaces it in place, so its position (and
//! therefore its tie-break rank) does not change. Queries are brute force
//! over the session's entries.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::metric::DistanceMetric;
use crate::models::IndexedEntry;

use super::{QueryMatch, Readiness, SessionFilter, StoreState, VectorStore};

pub struct InMemoryStore {
    metric: DistanceMetric,
    readiness: Readiness,
    entries: RwLock<Vec<IndexedEntry>>,
}

impl InMemoryStore {
    /// A ready, empty store using cosine distance.
    pub fn new() -> Self {
        Self::with_metric(DistanceMetric::Cosine)
    }

    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            metric,
            readiness: Readiness::ready(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// A store that stays in the given readiness state, for exercising the
    /// fail-fast paths.
    pub fn with_readiness(metric: DistanceMetric, readiness: Readiness) -> Self {
        Self {
            metric,
            readiness,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored entries across all sessions.
    pub fn len(&self) -> usize {
        self.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.read()
            .map(|e| e.iter().map(|entry| entry.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Clone of one entry, if present.
    pub fn get(&self, id: &str) -> Option<IndexedEntry> {
        self.read()
            .ok()
            .and_then(|e| e.iter().find(|entry| entry.id == id).cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<IndexedEntry>>> {
        self.entries
            .read()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexedEntry>>> {
        self.entries
            .write()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn state(&self) -> StoreState {
        self.readiness.get()
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()> {
        self.readiness.ensure_ready()?;
        let mut stored = self.write()?;
        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: SessionFilter<'_>,
    ) -> Result<Vec<QueryMatch>> {
        self.readiness.ensure_ready()?;
        let stored = self.read()?;
        let mut matches: Vec<QueryMatch> = stored
            .iter()
            .filter(|e| e.metadata.session_id == filter.session_id)
            .map(|e| QueryMatch {
                id: e.id.clone(),
                metadata: e.metadata.clone(),
                distance: Some(self.metric.distance(embedding, &e.embedding)),
            })
            .collect();
        // Stable: equal distances stay in insertion order.
        matches.sort_by(|a, b| {
            let da = a.distance.unwrap_or(f32::INFINITY);
            da.total_cmp(&b.distance.unwrap_or(f32::INFINITY))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn ids_for_file(&self, session_id: &str, file_path: &str) -> Result<Vec<String>> {
        self.readiness.ensure_ready()?;
        let stored = self.read()?;
        Ok(stored
            .iter()
            .filter(|e| e.metadata.session_id == session_id && e.metadata.file_path == file_path)
            .map(|e| e.id.clone())
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.readiness.ensure_ready()?;
        let mut stored = self.write()?;
        stored.retain(|e| !ids.contains(&e.id));
        Ok(())
    }
}
