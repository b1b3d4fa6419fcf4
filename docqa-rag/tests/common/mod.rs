//! Deterministic test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::{
    BackendConnector, Chunk, Chunker, Credentials, EmbeddingProvider, InMemoryVectorStore, Llm,
    RagConfig, RagError, RagPipeline, Result, SearchResult, SessionBackends, StuffSynthesizer,
    VectorStore,
};

pub const DIM: usize = 256;

/// Bag-of-words embedder: each lowercase word is hashed into one of `DIM`
/// buckets and the counts are L2-normalised. Texts sharing words score high.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed` / `embed_batch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % DIM as u64) as usize
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        vector[bucket(&word.to_lowercase())] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Returns the prompt it was given, so answers contain exactly the retrieved passages.
pub struct EchoLlm;

#[async_trait]
impl Llm for EchoLlm {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// Always fails with the given provider message.
pub struct RejectingLlm(pub String);

#[async_trait]
impl Llm for RejectingLlm {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::SynthesisError { provider: "rejecting".into(), message: self.0.clone() })
    }
}

/// Sleeps before answering; pair with paused tokio time.
pub struct SlowLlm(pub Duration);

#[async_trait]
impl Llm for SlowLlm {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(self.0).await;
        Ok("too late".to_string())
    }
}

/// Sleeps before embedding; pair with paused tokio time.
pub struct SlowEmbeddingProvider(pub Duration);

#[async_trait]
impl EmbeddingProvider for SlowEmbeddingProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.0).await;
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// An in-memory store whose writes and reads can be switched off.
#[derive(Debug, Default)]
pub struct FailingVectorStore {
    pub inner: InMemoryVectorStore,
    fail_upserts: AtomicBool,
    fail_searches: AtomicBool,
}

impl FailingVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorStore for FailingVectorStore {
    fn backend(&self) -> &str {
        "flaky"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(RagError::IndexUnavailable {
                backend: "flaky".into(),
                message: "503 Service Unavailable: upstream connect error".into(),
                failed_ids: chunks.iter().map(|c| c.id.clone()).collect(),
            });
        }
        self.inner.upsert(collection, chunks).await
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        self.inner.delete(collection, ids).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(RagError::index_unavailable("flaky", "connection reset by peer"));
        }
        self.inner.search(collection, embedding, top_k).await
    }
}

/// Wires fixed test doubles into a session, using the index name as collection.
pub struct MockConnector {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn Llm>,
    pub connections: AtomicUsize,
}

impl MockConnector {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn Llm>,
    ) -> Self {
        Self { embedder, store, llm, connections: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl BackendConnector for MockConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        config: &RagConfig,
        chunker: Arc<dyn Chunker>,
    ) -> Result<SessionBackends> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let pipeline = RagPipeline::builder()
            .config(config.clone())
            .embedding_provider(Arc::clone(&self.embedder))
            .vector_store(Arc::clone(&self.store))
            .chunker(chunker)
            .collection(credentials.index_name.as_str())
            .build()?;
        pipeline.prepare().await?;
        let synthesizer =
            StuffSynthesizer::new(Arc::clone(&self.llm)).with_timeout(config.request_timeout);
        Ok(SessionBackends { pipeline: Arc::new(pipeline), synthesizer })
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("co-test-key", "pc-test-key", "docs")
}
