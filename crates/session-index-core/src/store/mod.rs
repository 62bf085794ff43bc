//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines the operations the pipelines need from
//! a vector collection, enabling pluggable backends (in-memory here; SQLite
//! and Chroma in the app crate). Stores only persist and compare vectors
//! they are given: embeddings always arrive precomputed.
//!
//! Every store carries an explicit [`StoreState`]. Backends that need
//! asynchronous setup start `Uninitialized`, and their bootstrap moves them
//! to `Ready` or `Failed` exactly once. Operations on a store that is not
//! `Ready` fail fast with [`Error::StoreUnavailable`].
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorStore::upsert) | Insert or wholesale-replace entries by id |
//! | [`query`](VectorStore::query) | Nearest neighbours within one session |
//! | [`ids_for_file`](VectorStore::ids_for_file) | Ids stored for one file of one session |
//! | [`delete`](VectorStore::delete) | Remove entries by id |

pub mod memory;

use async_trait::async_trait;
use std::fmt;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::metric::DistanceMetric;
use crate::models::{EntryMetadata, IndexedEntry};

/// Restricts a query to one session's namespace.
#[derive(Debug, Clone, Copy)]
pub struct SessionFilter<'a> {
    pub session_id: &'a str,
}

/// One neighbour returned by [`VectorStore::query`].
///
/// `distance` is `None` when the backend returned an entry without a
/// comparable distance; the retrieval pipeline drops such matches.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub metadata: EntryMetadata,
    pub distance: Option<f32>,
}

/// Readiness of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Ready,
    Failed(String),
}

impl StoreState {
    pub fn is_ready(&self) -> bool {
        matches!(self, StoreState::Ready)
    }

    /// `Ok(())` when ready, otherwise the matching [`Error::StoreUnavailable`].
    pub fn ensure_ready(&self) -> Result<()> {
        match self {
            StoreState::Ready => Ok(()),
            StoreState::Uninitialized => Err(Error::StoreUnavailable(
                "collection is not initialized yet".to_string(),
            )),
            StoreState::Failed(reason) => Err(Error::StoreUnavailable(format!(
                "collection failed to initialize: {}",
                reason
            ))),
        }
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreState::Uninitialized => f.write_str("uninitialized"),
            StoreState::Ready => f.write_str("ready"),
            StoreState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Thread-safe holder of a [`StoreState`] that transitions at most once
/// away from `Uninitialized`.
#[derive(Debug)]
pub struct Readiness {
    state: RwLock<StoreState>,
}

impl Readiness {
    pub fn uninitialized() -> Self {
        Self {
            state: RwLock::new(StoreState::Uninitialized),
        }
    }

    pub fn ready() -> Self {
        Self {
            state: RwLock::new(StoreState::Ready),
        }
    }

    pub fn get(&self) -> StoreState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.get().ensure_ready()
    }

    /// Record the outcome of initialization. Returns `false` (and leaves
    /// the state untouched) if initialization was already settled.
    pub fn settle(&self, outcome: std::result::Result<(), String>) -> bool {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != StoreState::Uninitialized {
            return false;
        }
        *guard = match outcome {
            Ok(()) => StoreState::Ready,
            Err(reason) => StoreState::Failed(reason),
        };
        true
    }
}

/// Abstract vector collection shared by the indexing and retrieval pipelines.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Current readiness; checked synchronously before every operation.
    fn state(&self) -> StoreState;

    /// The metric under which [`query`](VectorStore::query) reports distances.
    fn metric(&self) -> DistanceMetric;

    /// Insert entries, replacing embedding and metadata of existing ids.
    /// An existing id keeps its original insertion position.
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()>;

    /// Up to `top_k` entries of `filter.session_id`, nearest first. Ties keep
    /// insertion order.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: SessionFilter<'_>,
    ) -> Result<Vec<QueryMatch>>;

    /// Ids currently stored for `file_path` within `session_id`.
    async fn ids_for_file(&self, session_id: &str, file_path: &str) -> Result<Vec<String>>;

    /// Remove entries by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}
