//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. It backs tests and local runs where no hosted index
//! is available.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    entries: HashMap<String, Chunk>,
}

impl Collection {
    fn check_dimensions(&self, actual: usize) -> Result<()> {
        if actual == self.dimensions {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch { expected: self.dimensions, actual })
        }
    }
}

/// An in-memory vector store using cosine similarity for search.
///
/// Each collection remembers the dimensionality it was created with and
/// rejects entries or queries of any other width.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored in `collection`, or `None` if it does not exist.
    pub async fn count(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.entries.len())
    }

    /// Fetch a stored entry by id.
    pub async fn get(&self, collection: &str, id: &str) -> Option<Chunk> {
        self.collections.read().await.get(collection)?.entries.get(id).cloned()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::index_unavailable(BACKEND, format!("collection '{collection}' does not exist"))
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, entries: HashMap::new() });
        collection.check_dimensions(dimensions)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        // Validate the whole batch first so a bad entry leaves the store untouched.
        for chunk in chunks {
            store.check_dimensions(chunk.embedding.len())?;
        }
        for chunk in chunks {
            store.entries.insert(chunk.id.clone(), chunk.clone());
        }

        debug!(collection, count = chunks.len(), "upserted chunks in memory");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            store.entries.remove(*id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        store.check_dimensions(embedding.len())?;

        let mut scored: Vec<SearchResult> = store
            .entries
            .values()
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: cosine_similarity(&chunk.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
