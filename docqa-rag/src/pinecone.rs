//! Pinecone vector store backend over the Pinecone REST API.
//!
//! This module is only available when the `pinecone` feature is enabled.
//!
//! A [`PineconeVectorStore`] is bound to one existing index. The index is
//! the collection: calls naming any other collection are rejected. Vectors
//! live in an optional namespace inside the index.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::pinecone::PineconeVectorStore;
//!
//! let store = PineconeVectorStore::connect("pc-...", "docs").await?;
//! store.create_collection("docs", 1024).await?;
//! store.upsert("docs", &chunks).await?;
//! let results = store.search("docs", &query_embedding, 2).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// The Pinecone control plane URL.
pub const PINECONE_CONTROL_PLANE: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";

/// Pinecone's recommended upper bound on vectors per upsert request.
const UPSERT_BATCH_SIZE: usize = 100;

const BACKEND: &str = "pinecone";

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
    dimension: Option<usize>,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<&'a [&'a str]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// A [`VectorStore`] backed by a [Pinecone](https://www.pinecone.io/) index.
pub struct PineconeVectorStore {
    client: reqwest::Client,
    api_key: String,
    index_name: String,
    host: String,
    dimension: Option<usize>,
    namespace: Option<String>,
}

impl PineconeVectorStore {
    /// Look up `index_name` on the Pinecone control plane and bind to its host.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the key is rejected, the
    /// index does not exist, or the control plane cannot be reached.
    pub async fn connect(api_key: impl Into<String>, index_name: impl Into<String>) -> Result<Self> {
        Self::connect_via(PINECONE_CONTROL_PLANE, api_key, index_name, Duration::from_secs(30)).await
    }

    /// Like [`connect`](Self::connect), against a specific control plane URL.
    pub async fn connect_via(
        control_plane: &str,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let index_name = index_name.into();
        if api_key.trim().is_empty() {
            return Err(RagError::index_unavailable(BACKEND, "API key must not be empty"));
        }

        let client = build_client(timeout)?;
        let url = format!("{}/indexes/{index_name}", control_plane.trim_end_matches('/'));
        let response = client
            .get(url)
            .header("Api-Key", &api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| request_failed("describe index", &e))?;
        let description: IndexDescription = read_json(response, "describe index").await?;

        debug!(index = %index_name, host = %description.host, dimension = ?description.dimension, "resolved pinecone index");
        Ok(Self {
            client,
            api_key,
            index_name,
            host: normalize_host(&description.host),
            dimension: description.dimension,
            namespace: None,
        })
    }

    /// Bind directly to a known index host without contacting the control plane.
    ///
    /// The index dimensionality is unknown, so dimension checks are left to the server.
    pub fn with_host(
        api_key: impl Into<String>,
        index_name: impl Into<String>,
        host: &str,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            api_key: api_key.into(),
            index_name: index_name.into(),
            host: normalize_host(host),
            dimension: None,
            namespace: None,
        })
    }

    /// Read and write vectors in `namespace` instead of the default one.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Set the HTTP timeout for each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Dimensionality reported by the control plane, if known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn check_collection(&self, collection: &str) -> Result<()> {
        if collection == self.index_name {
            Ok(())
        } else {
            Err(RagError::index_unavailable(
                BACKEND,
                format!("store is bound to index '{}', not '{collection}'", self.index_name),
            ))
        }
    }

    fn check_dimensions(&self, actual: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(RagError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &str,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}{path}", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(operation, &e))?;
        read_json(response, operation).await
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagError::index_unavailable(BACKEND, format!("failed to build HTTP client: {e}")))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn request_failed(operation: &str, e: &reqwest::Error) -> RagError {
    error!(backend = BACKEND, operation, error = %e, "request failed");
    let outcome = if e.is_timeout() { "timed out" } else { "failed" };
    RagError::index_unavailable(BACKEND, format!("{operation} request {outcome}: {e}"))
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response, operation: &str) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(backend = BACKEND, operation, %status, "API error");
        return Err(RagError::index_unavailable(
            BACKEND,
            format!("{operation} returned {status}: {body}"),
        ));
    }
    response.json().await.map_err(|e| {
        RagError::index_unavailable(BACKEND, format!("failed to parse {operation} response: {e}"))
    })
}

/// Chunk text, parent document and metadata as a Pinecone metadata object.
fn chunk_metadata(chunk: &Chunk) -> Map<String, Value> {
    let mut metadata: Map<String, Value> =
        chunk.metadata.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect();
    metadata.insert("text".to_string(), Value::String(chunk.text.clone()));
    metadata.insert("document_id".to_string(), Value::String(chunk.document_id.clone()));
    metadata
}

fn match_to_result(m: Match) -> SearchResult {
    let mut text = String::new();
    let mut document_id = String::new();
    let mut metadata = HashMap::new();

    for (key, value) in m.metadata {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        match key.as_str() {
            "text" => text = value,
            "document_id" => document_id = value,
            _ => {
                metadata.insert(key, value);
            }
        }
    }

    SearchResult {
        chunk: Chunk { id: m.id, text, embedding: m.values, metadata, document_id },
        score: m.score,
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    /// Pinecone indexes are created outside this client; this only checks
    /// that `name` is the bound index and that its dimensionality matches.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.check_collection(name)?;
        self.check_dimensions(dimensions)
    }

    /// Removes every vector in the namespace. The index itself is kept.
    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.check_collection(name)?;
        let body = DeleteRequest { ids: None, delete_all: true, namespace: self.namespace.as_deref() };
        let _: Value = self.post("/vectors/delete", &body, "delete all").await?;
        debug!(index = name, "cleared pinecone namespace");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.check_collection(collection)?;
        if chunks.is_empty() {
            return Ok(());
        }
        for chunk in chunks {
            self.check_dimensions(chunk.embedding.len())?;
        }

        for (batch_index, batch) in chunks.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let body = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|chunk| PineconeVector {
                        id: &chunk.id,
                        values: &chunk.embedding,
                        metadata: chunk_metadata(chunk),
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };

            if let Err(err) = self.post::<_, Value>("/vectors/upsert", &body, "upsert").await {
                // This batch and every later one were not written.
                let failed_ids: Vec<String> = chunks[batch_index * UPSERT_BATCH_SIZE..]
                    .iter()
                    .map(|c| c.id.clone())
                    .collect();
                let message = match err {
                    RagError::IndexUnavailable { message, .. } => message,
                    other => other.to_string(),
                };
                return Err(RagError::IndexUnavailable {
                    backend: BACKEND.to_string(),
                    message,
                    failed_ids,
                });
            }
        }

        debug!(index = collection, count = chunks.len(), "upserted chunks to pinecone");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.check_collection(collection)?;
        if ids.is_empty() {
            return Ok(());
        }
        let body = DeleteRequest { ids: Some(ids), delete_all: false, namespace: self.namespace.as_deref() };
        let _: Value = self.post("/vectors/delete", &body, "delete").await?;
        debug!(index = collection, count = ids.len(), "deleted vectors from pinecone");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.check_collection(collection)?;
        self.check_dimensions(embedding.len())?;

        let body = QueryRequest {
            vector: embedding,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self.post("/query", &body, "query").await?;
        Ok(response.matches.into_iter().map(match_to_result).collect())
    }
}
