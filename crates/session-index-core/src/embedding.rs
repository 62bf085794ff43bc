//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement.
//! Callers go through [`embed_texts`] and [`embed_query`], which enforce the
//! embedding contract on every backend:
//!
//! - empty or whitespace-only input is rejected before any model call;
//! - the model must return exactly one vector per input;
//! - every vector must have the configured dimensionality.
//!
//! No backend result is ever replaced by a zero vector, and nothing here
//! retries. Concrete providers (OpenAI, Ollama, fastembed) live in the
//! `session-index` app crate.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Embedding;

/// An external embedding model.
///
/// Model identity and dimensionality are fixed by configuration when the
/// embedder is constructed; they are not negotiated per call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per text in input order.
    ///
    /// Failures must be reported as [`Error::EmbeddingFailure`].
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// Embed a batch of texts and check the result shape.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if any text is empty or whitespace-only.
/// - [`Error::EmbeddingFailure`] if the backend fails or returns the wrong
///   number of vectors or a vector of the wrong dimensionality.
pub async fn embed_texts(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Embedding>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(Error::InvalidInput(format!(
            "cannot embed empty text (batch position {})",
            pos
        )));
    }

    let vectors = embedder.embed_batch(texts).await.map_err(|e| match e {
        Error::EmbeddingFailure(_) => e,
        other => Error::EmbeddingFailure(other.to_string()),
    })?;

    if vectors.len() != texts.len() {
        return Err(Error::EmbeddingFailure(format!(
            "model {} returned {} vectors for {} inputs",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    let dims = embedder.dims();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(Error::EmbeddingFailure(format!(
            "model {} returned a {}-dimensional vector, expected {}",
            embedder.model_name(),
            bad.len(),
            dims
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::EmbeddingFailure(format!(
            "model {} returned a non-finite vector component",
            embedder.model_name()
        )));
    }

    Ok(vectors)
}

/// Embed a single text (e.g. a search query).
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Embedding> {
    let mut vectors = embed_texts(embedder, &[text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| Error::EmbeddingFailure("empty embedding response".to_string()))
}

/// Encode a float vector as little-endian f32 bytes.
///
/// # Example
///
/// ```rust
/// use session_index_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        dims: usize,
        returned_dims: usize,
        extra: usize,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                returned_dims: dims,
                extra: 0,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..texts.len() + self.extra)
                .map(|i| vec![i as f32; self.returned_dims])
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Err(Error::Store("wrong layer".into()))
        }
    }

    #[tokio::test]
    async fn test_embed_texts_in_order() {
        let e = FixedEmbedder::new(3);
        let out = embed_texts(&e, &["a".into(), "b".into()]).await.unwrap();
        assert_eq!(out, vec![vec![0.0; 3], vec![1.0; 3]]);
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_call() {
        let e = FixedEmbedder::new(3);
        let err = embed_query(&e, "  ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(e.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_dimensionality() {
        let mut e = FixedEmbedder::new(4);
        e.returned_dims = 2;
        let err = embed_query(&e, "hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_wrong_vector_count() {
        let mut e = FixedEmbedder::new(2);
        e.extra = 1;
        let err = embed_texts(&e, &["a".into()]).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
    }

    struct NonFiniteEmbedder(f32);

    #[async_trait]
    impl Embedder for NonFiniteEmbedder {
        fn model_name(&self) -> &str {
            "non-finite"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| vec![0.5, self.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_non_finite_components_rejected() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let err = embed_query(&NonFiniteEmbedder(bad), "hello").await.unwrap_err();
            assert!(matches!(err, Error::EmbeddingFailure(_)), "{bad}: {err:?}");
        }
        assert!(embed_query(&NonFiniteEmbedder(1.0), "hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_errors_become_embedding_failures() {
        let err = embed_query(&BrokenEmbedder, "hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let e = FixedEmbedder::new(2);
        assert!(embed_texts(&e, &[]).await.unwrap().is_empty());
        assert_eq!(e.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}
