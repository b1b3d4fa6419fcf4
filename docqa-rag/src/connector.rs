//! Connects a session to Cohere and Pinecone.
//!
//! Available with both the `cohere` and `pinecone` features.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::chunking::Chunker;
use crate::cohere::{COHERE_API_BASE, CohereEmbeddingProvider, CohereLlm};
use crate::config::{Credentials, RagConfig};
use crate::deadline::{Stage, with_deadline};
use crate::error::Result;
use crate::pinecone::{PINECONE_CONTROL_PLANE, PineconeVectorStore};
use crate::pipeline::RagPipeline;
use crate::session::{BackendConnector, SessionBackends};
use crate::synthesis::StuffSynthesizer;

/// The production [`BackendConnector`]: Cohere embeddings and chat, Pinecone index.
///
/// The embedding key is used for both Cohere clients. Connecting resolves
/// the Pinecone index host and checks that its dimensionality matches the
/// embedding model.
#[derive(Debug, Clone)]
pub struct HostedConnector {
    cohere_base_url: String,
    pinecone_control_plane: String,
}

impl HostedConnector {
    /// Connect to the public Cohere and Pinecone endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the service endpoints, e.g. to point at a local mock server.
    pub fn with_endpoints(
        cohere_base_url: impl Into<String>,
        pinecone_control_plane: impl Into<String>,
    ) -> Self {
        Self {
            cohere_base_url: cohere_base_url.into(),
            pinecone_control_plane: pinecone_control_plane.into(),
        }
    }
}

impl Default for HostedConnector {
    fn default() -> Self {
        Self::with_endpoints(COHERE_API_BASE, PINECONE_CONTROL_PLANE)
    }
}

#[async_trait]
impl BackendConnector for HostedConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        config: &RagConfig,
        chunker: Arc<dyn Chunker>,
    ) -> Result<SessionBackends> {
        let timeout = config.request_timeout;

        let embedder = CohereEmbeddingProvider::new(credentials.embedding_api_key.as_str())?
            .with_base_url(self.cohere_base_url.as_str())
            .with_timeout(timeout)?;

        let store = with_deadline(
            Stage::Index("pinecone"),
            timeout,
            PineconeVectorStore::connect_via(
                &self.pinecone_control_plane,
                credentials.vector_store_api_key.as_str(),
                credentials.index_name.as_str(),
                timeout,
            ),
        )
        .await?;

        let pipeline = RagPipeline::builder()
            .config(config.clone())
            .embedding_provider(Arc::new(embedder))
            .vector_store(Arc::new(store))
            .chunker(chunker)
            .collection(credentials.index_name.as_str())
            .build()?;
        pipeline.prepare().await?;

        let llm = CohereLlm::new(credentials.embedding_api_key.as_str())?
            .with_base_url(self.cohere_base_url.as_str())
            .with_timeout(timeout)?;
        let synthesizer = StuffSynthesizer::new(Arc::new(llm)).with_timeout(timeout);

        info!(index = %credentials.index_name, "connected to Cohere and Pinecone");
        Ok(SessionBackends { pipeline: Arc::new(pipeline), synthesizer })
    }
}
