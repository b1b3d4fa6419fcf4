//! Cohere embedding provider and chat model over the Cohere REST API.
//!
//! This module is only available when the `cohere` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::synthesis::Llm;

/// The default Cohere API base URL.
pub const COHERE_API_BASE: &str = "https://api.cohere.com";

/// The default embedding model.
const DEFAULT_EMBED_MODEL: &str = "embed-english-v3.0";

/// The dimensionality of `embed-english-v3.0`.
const DEFAULT_DIMENSIONS: usize = 1024;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "command-r";

/// Cohere accepts at most this many texts per embed request.
const MAX_TEXTS_PER_REQUEST: usize = 96;

const PROVIDER: &str = "Cohere";

fn build_client(timeout: Duration) -> std::result::Result<reqwest::Client, String> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        error!(provider = PROVIDER, error = %e, "failed to build HTTP client");
        format!("failed to build HTTP client: {e}")
    })
}

fn request_failed(e: &reqwest::Error) -> String {
    error!(provider = PROVIDER, error = %e, "request failed");
    if e.is_timeout() { format!("request timed out: {e}") } else { format!("request failed: {e}") }
}

/// Pull the `message` field out of a Cohere error body, or return the body itself.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body)
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Which side of retrieval a text is embedded for.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum InputType {
    SearchDocument,
    SearchQuery,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [&'a str],
    input_type: InputType,
    truncate: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// An [`EmbeddingProvider`] backed by the Cohere `/v1/embed` endpoint.
///
/// Batches are embedded with `input_type = search_document` and single
/// queries with `search_query`. Batches larger than 96 texts are split into
/// several requests, sent with bounded concurrency, and reassembled in
/// input order.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::cohere::CohereEmbeddingProvider;
///
/// let provider = CohereEmbeddingProvider::new("co-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct CohereEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    max_concurrent_requests: usize,
}

impl CohereEmbeddingProvider {
    /// Create a provider for `embed-english-v3.0` (1024 dimensions).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: build_client(Duration::from_secs(30)).map_err(Self::err)?,
            api_key,
            base_url: COHERE_API_BASE.into(),
            model: DEFAULT_EMBED_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            max_concurrent_requests: 4,
        })
    }

    /// Use another embedding model with the given output dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point the provider at another API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout for each request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout).map_err(Self::err)?;
        Ok(self)
    }

    /// Limit how many embed requests run at once for large batches.
    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    fn err(message: String) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message }
    }

    async fn request(&self, texts: &[&str], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, ?input_type, "embedding batch");

        let body = EmbedRequest { model: &self.model, texts, input_type, truncate: "END" };
        let response = self
            .client
            .post(format!("{}/v1/embed", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::err(request_failed(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::err(format!("API returned {status}: {detail}")));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::err(format!("failed to parse response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Self::err(format!(
                "expected {} embeddings, received {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.request(&[text], InputType::SearchQuery).await?;
        results.into_iter().next().ok_or_else(|| Self::err("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<_> = texts
            .chunks(MAX_TEXTS_PER_REQUEST)
            .map(|batch| self.request(batch, InputType::SearchDocument))
            .collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(requests)
            .buffered(self.max_concurrent_requests)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: String,
}

/// An [`Llm`] backed by the Cohere `/v1/chat` endpoint.
///
/// Each prompt is sent as a single message with no chat history.
/// Defaults: `command-r`, temperature 0.75, 256 output tokens.
pub struct CohereLlm {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CohereLlm {
    /// Create a chat model client.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SynthesisError`] if `api_key` is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::SynthesisError {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: build_client(Duration::from_secs(30)).map_err(Self::err)?,
            api_key,
            base_url: COHERE_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.75,
            max_tokens: 256,
        })
    }

    /// Use another Cohere chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the number of tokens in each answer.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point the client at another API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the HTTP timeout for each request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout).map_err(Self::err)?;
        Ok(self)
    }

    fn err(message: String) -> RagError {
        RagError::SynthesisError { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl Llm for CohereLlm {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "chat request");

        let body = ChatRequest {
            model: &self.model,
            message: prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response = self
            .client
            .post(format!("{}/v1/chat", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::err(request_failed(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(provider = PROVIDER, %status, detail = %detail, "API error");
            return Err(Self::err(detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::err(format!("failed to parse response: {e}"))
        })?;
        Ok(parsed.text)
    }
}
