//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → upsert) and
//! retrieval (embed → search) over one collection by composing an
//! [`EmbeddingProvider`], a [`VectorStore`] and a [`Chunker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, InMemoryVectorStore, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(RecursiveChunker::new(800, 50)?))
//!     .collection("docs")
//!     .build()?;
//!
//! pipeline.prepare().await?;
//! pipeline.ingest(&documents).await?;
//! let results = pipeline.retrieve("search query", 2).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::deadline::{Stage, with_deadline};
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// Summary of one ingestion batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Number of documents in the batch.
    pub document_count: usize,
    /// Ids of the entries written to the index, in chunk order.
    pub chunk_ids: Vec<String>,
}

impl IngestReport {
    /// Number of chunks embedded and stored.
    pub fn chunk_count(&self) -> usize {
        self.chunk_ids.len()
    }
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. Collection preparation and
/// retrieval calls are bounded by [`RagConfig::request_timeout`]; batch
/// ingestion calls rely on the per-request bound of the provider.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// The collection this pipeline writes to and searches.
    pub fn collection(&self) -> &str {
        self.retriever.collection()
    }

    /// Return the query-side retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Create the collection, or verify that an existing one matches the
    /// embedding provider's dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] or [`RagError::DimensionMismatch`].
    pub async fn prepare(&self) -> Result<()> {
        let collection = self.collection();
        let dimensions = self.embedding_provider.dimensions();
        let backend = self.vector_store.backend();
        with_deadline(
            Stage::Index(backend),
            self.config.request_timeout,
            self.vector_store.create_collection(collection, dimensions),
        )
        .await
        .inspect_err(|e| error!(backend, collection, error = %e, "failed to prepare collection"))
    }

    /// Split every document into chunks without touching any external service.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunker.chunk(document)).collect()
    }

    /// Embed `chunks` in one batch call, then upsert them in one aggregate write.
    ///
    /// Returns the chunks as stored, with embeddings attached. Neither batch
    /// call has an overall deadline; a provider that pages a batch into
    /// several requests bounds each request on its own.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if embedding fails or returns the wrong number of vectors
    /// - [`RagError::DimensionMismatch`] if a vector has the wrong width
    /// - [`RagError::IndexUnavailable`] if the upsert fails; entries already
    ///   written are not rolled back
    pub async fn index_chunks(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let provider = self.embedding_provider.name();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(&texts)
            .await
            .and_then(|embeddings| {
                check_batch(self.embedding_provider.as_ref(), texts.len(), &embeddings)?;
                Ok(embeddings)
            })
            .inspect_err(|e| error!(provider, error = %e, "embedding failed during ingestion"))?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let backend = self.vector_store.backend();
        let collection = self.collection();
        self.vector_store
            .upsert(collection, &chunks)
            .await
            .inspect_err(|e| error!(backend, collection, error = %e, "upsert failed during ingestion"))?;

        info!(collection, chunk_count = chunks.len(), "indexed chunks");
        Ok(chunks)
    }

    /// Ingest a batch of documents: chunk → embed → upsert.
    ///
    /// # Errors
    ///
    /// See [`index_chunks`](Self::index_chunks).
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let chunks = self.chunk_documents(documents);
        let stored = self.index_chunks(chunks).await?;
        Ok(IngestReport {
            document_count: documents.len(),
            chunk_ids: stored.into_iter().map(|c| c.id).collect(),
        })
    }

    /// Retrieve up to `k` passages for `query`. See [`Retriever::retrieve`].
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(query, k).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_store`, `chunker` and `collection` are
/// required; `config` defaults to [`RagConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    collection: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the collection (index name) to use.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::ConfigError("chunker is required".to_string()))?;
        let collection = self
            .collection
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| RagError::ConfigError("collection is required".to_string()))?;

        let retriever =
            Retriever::new(Arc::clone(&embedding_provider), Arc::clone(&vector_store), collection)
                .with_timeout(config.request_timeout);

        Ok(RagPipeline { config, embedding_provider, vector_store, chunker, retriever })
    }
}
