//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
///
/// `Display` carries the full diagnostic detail (provider, status codes,
/// response bodies) and is meant for the log channel. Use
/// [`RagError::user_message`] for text shown to the person asking.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid setup: sizes, credentials, or a call made in the wrong session phase.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The embedding service failed (transport, rate limit, invalid key, timeout).
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index could not be reached or rejected the request.
    #[error("Vector index unavailable ({backend}): {message}{}", failed_suffix(.failed_ids))]
    IndexUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// Entry ids known not to have been written. Empty when unknown or not applicable.
        failed_ids: Vec<String>,
    },

    /// A vector's dimensionality differs from the one the index stores.
    #[error("Dimension mismatch: index stores {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the stored vectors.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// The language model call failed.
    #[error("Synthesis error ({provider}): {message}")]
    SynthesisError {
        /// The language model provider that produced the error.
        provider: String,
        /// The provider's message, kept verbatim.
        message: String,
    },

    /// An uploaded document could not be turned into text.
    #[error("Document error ({source_name}): {message}")]
    DocumentError {
        /// File name or other identifier of the document.
        source_name: String,
        /// A description of the failure.
        message: String,
    },
}

fn failed_suffix(failed_ids: &[String]) -> String {
    if failed_ids.is_empty() {
        String::new()
    } else {
        format!(" ({} entries not written: {})", failed_ids.len(), failed_ids.join(", "))
    }
}

/// The category of a [`RagError`], independent of its diagnostic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RagErrorKind {
    Configuration,
    EmbeddingService,
    IndexUnavailable,
    DimensionMismatch,
    Synthesis,
    Document,
}

impl RagErrorKind {
    /// Stable identifier used in structured log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::EmbeddingService => "embedding_service",
            Self::IndexUnavailable => "index_unavailable",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::Synthesis => "synthesis",
            Self::Document => "document",
        }
    }
}

impl RagError {
    /// Shorthand for an [`IndexUnavailable`](RagError::IndexUnavailable) error with no failed ids.
    pub fn index_unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            backend: backend.into(),
            message: message.into(),
            failed_ids: Vec::new(),
        }
    }

    /// Return the category of this error.
    pub fn kind(&self) -> RagErrorKind {
        match self {
            Self::ConfigError(_) => RagErrorKind::Configuration,
            Self::EmbeddingError { .. } => RagErrorKind::EmbeddingService,
            Self::IndexUnavailable { .. } => RagErrorKind::IndexUnavailable,
            Self::DimensionMismatch { .. } => RagErrorKind::DimensionMismatch,
            Self::SynthesisError { .. } => RagErrorKind::Synthesis,
            Self::DocumentError { .. } => RagErrorKind::Document,
        }
    }

    /// The message to show the user for this error.
    ///
    /// Provider internals stay out of it, except for synthesis failures whose
    /// provider message is passed through unchanged.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConfigError(detail) => format!("Configuration problem: {detail}"),
            Self::EmbeddingError { .. } => {
                "The embedding service could not process the request. Check your API key and try again."
                    .to_string()
            }
            Self::IndexUnavailable { failed_ids, .. } if !failed_ids.is_empty() => format!(
                "The vector index is unavailable; {} entries were not stored. Please retry the upload.",
                failed_ids.len()
            ),
            Self::IndexUnavailable { .. } => {
                "The vector index is unavailable. Check the index name and API key.".to_string()
            }
            Self::DimensionMismatch { expected, actual } => format!(
                "The vector index expects {expected}-dimensional embeddings but the embedding model produces {actual}."
            ),
            Self::SynthesisError { message, .. } => message.clone(),
            Self::DocumentError { source_name, .. } => {
                format!("Could not read text from '{source_name}'.")
            }
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
