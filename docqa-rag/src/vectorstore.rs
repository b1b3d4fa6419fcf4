//! Vector index client trait.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A client for a vector index holding `(id, vector, metadata)` entries.
///
/// Entries are [`Chunk`]s keyed by [`Chunk::id`]; writing an existing id
/// replaces the stored entry. Collections map to whatever the backend calls
/// an index or namespace.
///
/// Backends report failures as
/// [`RagError::IndexUnavailable`](crate::RagError::IndexUnavailable) (with
/// the ids that were not written, when known) or
/// [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Create a collection, or verify an existing one accepts `dimensions`-wide vectors.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace entries. Succeeds only if every entry was written.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete entries by id. Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Return up to `top_k` entries ordered by descending similarity to `embedding`.
    ///
    /// Asking for more entries than are stored returns all of them.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
