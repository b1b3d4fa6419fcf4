//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that maps text to fixed-dimension vectors.
///
/// `embed` is used for questions and `embed_batch` for document chunks, so
/// backends that distinguish query and document embeddings can do so. The
/// default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) once per input, in order.
///
/// Each call is a single attempt; retrying is left to the caller.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&["first passage", "second passage"]).await?;
/// assert_eq!(vectors.len(), 2);
/// assert!(vectors.iter().all(|v| v.len() == provider.dimensions()));
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensionality of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Verify that a batch response has one vector per input and a uniform width.
pub(crate) fn check_batch(
    provider: &dyn EmbeddingProvider,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("expected {expected} embeddings, received {}", vectors.len()),
        });
    }
    let dimensions = provider.dimensions();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(RagError::DimensionMismatch { expected: dimensions, actual: bad.len() });
    }
    Ok(())
}
