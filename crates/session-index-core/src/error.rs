//! Error taxonomy shared by the chunker, embedders, stores, and pipelines.
//!
//! Pipelines never turn a failure into a default value. The only "nothing to
//! do" outcomes are expressed as successful results: an empty file
//! (`chunk_count == 0`), a skipped lock file, and an empty query.
//!
//! Failures raised while a pipeline is already working on a request are
//! wrapped ([`Error::IndexingFailure`], [`Error::SearchFailure`]) so the
//! caller can tell which operation was abandoned; [`Error::root`] recovers
//! the underlying cause.

/// Result type used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid chunking or pipeline parameters. Fatal at setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller broke an input contract (empty text to embed, empty
    /// session id, `top_k == 0`).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding model errored, timed out, or returned vectors of the
    /// wrong shape.
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    /// The collection is not initialized, failed to initialize, or cannot
    /// be reached.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// A reachable store rejected an operation.
    #[error("vector store error: {0}")]
    Store(String),

    /// Indexing one file was abandoned; nothing from this revision was
    /// committed unless the failure happened during stale-chunk purge.
    #[error("indexing {file_path} failed: {source}")]
    IndexingFailure {
        file_path: String,
        #[source]
        source: Box<Error>,
    },

    /// A search was abandoned.
    #[error("search failed: {source}")]
    SearchFailure {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn indexing(file_path: &str, source: Error) -> Self {
        Error::IndexingFailure {
            file_path: file_path.to_string(),
            source: Box::new(source),
        }
    }

    pub fn search(source: Error) -> Self {
        Error::SearchFailure {
            source: Box::new(source),
        }
    }

    /// The innermost error, unwrapping pipeline wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::IndexingFailure { source, .. } | Error::SearchFailure { source } => {
                source.root()
            }
            other => other,
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Error::EmbeddingFailure(_) | Error::StoreUnavailable(_)
        )
    }
}
