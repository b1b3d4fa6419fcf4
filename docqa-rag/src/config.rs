//! Configuration for the RAG pipeline and session credentials.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Upper bound on every external call (embedding, index, language model).
    pub request_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 50,
            top_k: 2,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `request_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::ConfigError(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared size check for every chunker.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the timeout applied to each external call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Environment variable holding the embedding / language model API key.
pub const EMBEDDING_API_KEY_VAR: &str = "COHERE_API_KEY";
/// Environment variable holding the vector store API key.
pub const VECTOR_STORE_API_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable holding the vector store index name.
pub const INDEX_NAME_VAR: &str = "PINECONE_INDEX_NAME";

/// The three values a session needs before it can ingest anything.
///
/// Held in process memory only. `Debug` output redacts both keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API key for the embedding and language model service.
    pub embedding_api_key: String,
    /// API key for the vector store.
    pub vector_store_api_key: String,
    /// Name of the vector store index to write to and query.
    pub index_name: String,
}

impl Credentials {
    /// Create credentials from the three session values.
    pub fn new(
        embedding_api_key: impl Into<String>,
        vector_store_api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            embedding_api_key: embedding_api_key.into(),
            vector_store_api_key: vector_store_api_key.into(),
            index_name: index_name.into(),
        }
    }

    /// Read credentials from `COHERE_API_KEY`, `PINECONE_API_KEY` and `PINECONE_INDEX_NAME`.
    ///
    /// Unset variables become empty strings, so [`validate`](Self::validate)
    /// reports every missing one at once.
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| std::env::var(name).unwrap_or_default();
        let credentials = Self::new(
            read(EMBEDDING_API_KEY_VAR),
            read(VECTOR_STORE_API_KEY_VAR),
            read(INDEX_NAME_VAR),
        );
        credentials.validate()?;
        Ok(credentials)
    }

    /// Check that none of the three values is blank.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming every missing value.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("embedding API key", &self.embedding_api_key),
            ("vector store API key", &self.vector_store_api_key),
            ("index name", &self.index_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigError(format!("missing {}", missing.join(", "))))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("embedding_api_key", &"<redacted>")
            .field("vector_store_api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .finish()
    }
}
