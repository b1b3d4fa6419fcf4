//! Query-time retrieval: embed the question, then search the index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::deadline::{Stage, with_deadline};
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Finds the stored passages most similar to a question.
///
/// Every call embeds the query afresh; nothing is cached between calls.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    request_timeout: Duration,
}

impl Retriever {
    /// Create a retriever over `collection` with a 30 second timeout per call.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedding_provider,
            vector_store,
            collection: collection.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the timeout applied to the embedding call and to the index query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The collection this retriever searches.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return up to `k` passages ordered by descending similarity to `query`.
    ///
    /// `k` larger than the number of stored entries returns every entry.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`
    /// - [`RagError::EmbeddingError`] if the query cannot be embedded
    /// - [`RagError::IndexUnavailable`] or [`RagError::DimensionMismatch`] from the index
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        let provider = self.embedding_provider.name();
        let query_embedding = with_deadline(
            Stage::Embedding(provider),
            self.request_timeout,
            self.embedding_provider.embed(query),
        )
        .await
        .inspect_err(|e| error!(provider, error = %e, "query embedding failed"))?;

        let backend = self.vector_store.backend();
        let results = with_deadline(
            Stage::Index(backend),
            self.request_timeout,
            self.vector_store.search(&self.collection, &query_embedding, k),
        )
        .await
        .inspect_err(|e| {
            error!(backend, collection = %self.collection, error = %e, "vector search failed");
        })?;

        debug!(collection = %self.collection, k, result_count = results.len(), "retrieved passages");
        Ok(results)
    }
}
