//! # docqa-rag
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! Documents are split into overlapping chunks, embedded, and written to a
//! vector index. A question is embedded the same way, the nearest chunks are
//! retrieved, and a language model answers from them in a single prompt.
//!
//! ## Features
//!
//! - `cohere`: Cohere embeddings and chat ([`cohere`])
//! - `pinecone`: Pinecone vector index ([`pinecone`])
//! - `pdf`: per-page PDF text extraction ([`loader`])
//! - `full`: all of the above, plus [`connector::HostedConnector`]
//!
//! The in-memory vector store and both chunkers are always available.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Credentials, RagConfig, RagSession, RecursiveChunker};
//! use docqa_rag::connector::HostedConnector;
//!
//! let config = RagConfig::default();
//! let chunker = Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?);
//! let mut session = RagSession::new(config, chunker, Arc::new(HostedConnector::new()))?;
//!
//! session.configure(Credentials::from_env()?).await?;
//! session.ingest_pdfs(&uploads).await?;
//! let answer = session.ask("What is the warranty period?").await?;
//! ```

pub mod chunking;
pub mod config;
mod deadline;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod pipeline;
pub mod retriever;
pub mod session;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "cohere")]
pub mod cohere;
#[cfg(all(feature = "cohere", feature = "pinecone"))]
pub mod connector;
#[cfg(feature = "pdf")]
pub mod loader;
#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use chunking::{CharWindows, Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{Credentials, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, RagErrorKind, Result};
pub use inmemory::InMemoryVectorStore;
pub use pipeline::{IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use session::{
    BackendConnector, ConversationTurn, RagSession, Role, SessionBackends, SessionPhase,
};
pub use synthesis::{Llm, StuffSynthesizer, build_prompt};
pub use vectorstore::VectorStore;

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
#[cfg(feature = "pdf")]
pub use session::PdfUpload;
