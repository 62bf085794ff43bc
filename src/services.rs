//! Service wiring: one store, one embedder, and the two pipelines built on
//! them, constructed once per process and shared by the server and CLI.
//!
//! Persistent backends start `Uninitialized`. [`Services::spawn_initialize`]
//! runs their setup in a single background task; until it settles, every
//! pipeline call fails fast with `StoreUnavailable`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use session_index_core::embedding::Embedder;
use session_index_core::store::memory::InMemoryStore;
use session_index_core::store::{StoreState, VectorStore};
use session_index_core::{Indexer, Retriever};

use crate::chroma_store::{ChromaSettings, ChromaStore};
use crate::config::{Config, StoreBackend};
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteVectorStore;

#[derive(Clone)]
enum Backend {
    /// Needs no setup (in-memory, or supplied already initialized).
    Ready,
    Sqlite(Arc<SqliteVectorStore>, PathBuf),
    Chroma(Arc<ChromaStore>),
}

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn VectorStore>,
    pub indexer: Arc<Indexer>,
    pub retriever: Arc<Retriever>,
    backend: Backend,
}

impl Services {
    /// Build the configured store and embedder. The store is not yet
    /// initialized; see [`initialize`](Self::initialize).
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let metric = config.store.metric;

        let (store, backend): (Arc<dyn VectorStore>, Backend) = match config.store.backend {
            StoreBackend::Memory => (Arc::new(InMemoryStore::with_metric(metric)), Backend::Ready),
            StoreBackend::Sqlite => {
                let path = config
                    .store
                    .path
                    .clone()
                    .context("store.path must be set when backend is 'sqlite'")?;
                let store = Arc::new(SqliteVectorStore::open(&path, metric)?);
                (store.clone(), Backend::Sqlite(store, path))
            }
            StoreBackend::Chroma => {
                let url = config
                    .store
                    .url
                    .clone()
                    .context("store.url must be set when backend is 'chroma'")?;
                let store = Arc::new(ChromaStore::new(ChromaSettings {
                    url,
                    tenant: config.store.tenant.clone(),
                    database: config.store.database.clone(),
                    collection: config.store.collection.clone(),
                    metric,
                    timeout: Duration::from_secs(config.store.timeout_secs),
                })?);
                (store.clone(), Backend::Chroma(store))
            }
        };

        Self::build(store, embedder, config, backend)
    }

    /// Wire pipelines around a store that needs no initialization.
    pub fn with_store(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &Config,
    ) -> Result<Self> {
        Self::build(store, embedder, config, Backend::Ready)
    }

    fn build(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &Config,
        backend: Backend,
    ) -> Result<Self> {
        let indexer = Indexer::new(store.clone(), embedder.clone(), config.index_params()?)?;
        let retriever =
            Retriever::new(store.clone(), embedder).with_default_top_k(config.retrieval.top_k)?;

        Ok(Self {
            store,
            indexer: Arc::new(indexer),
            retriever: Arc::new(retriever),
            backend,
        })
    }

    pub fn store_state(&self) -> StoreState {
        self.store.state()
    }

    /// Run backend setup and settle the store's readiness.
    pub async fn initialize(&self) -> session_index_core::Result<()> {
        let outcome = match &self.backend {
            Backend::Ready => Ok(()),
            Backend::Sqlite(store, path) => store.initialize(path).await,
            Backend::Chroma(store) => store.initialize().await,
        };
        match &outcome {
            Ok(()) => tracing::info!(state = %self.store_state(), "vector store initialized"),
            Err(e) => tracing::error!(error = %e, "vector store failed to initialize"),
        }
        outcome
    }

    /// Start [`initialize`](Self::initialize) on a background task.
    pub fn spawn_initialize(&self) -> tokio::task::JoinHandle<()> {
        let services = self.clone();
        tokio::spawn(async move {
            // Failure is recorded in the store state and logged.
            let _ = services.initialize().await;
        })
    }
}
