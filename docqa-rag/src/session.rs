//! Per-user session: configuration, ingestion, question answering, transcript.
//!
//! A [`RagSession`] walks through
//! `Unconfigured → Configured → Ingesting → Ready → Answering → Ready`.
//! Each call runs to completion before the next one (every operation takes
//! `&mut self`). Errors are returned to the caller and never poison the
//! session: it falls back to `Configured` after a failed ingestion and stays
//! `Ready` after a failed question.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::chunking::Chunker;
use crate::config::{Credentials, RagConfig};
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::pipeline::{IngestReport, RagPipeline};
use crate::synthesis::StuffSynthesizer;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No credentials yet.
    Unconfigured,
    /// Connected to the external services; nothing ingested yet, or the last ingestion failed.
    Configured,
    /// An ingestion batch is running.
    Ingesting,
    /// Documents are indexed; questions can be asked.
    Ready,
    /// A question is being answered.
    Answering,
}

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ConversationTurn {
    /// A question asked by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An answer given by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The handles a configured session keeps for its lifetime.
#[derive(Clone)]
pub struct SessionBackends {
    /// Ingestion and retrieval over the session's index.
    pub pipeline: Arc<RagPipeline>,
    /// Answer generation.
    pub synthesizer: StuffSynthesizer,
}

/// Builds [`SessionBackends`] from the user's credentials.
///
/// Implementations create the embedding provider, vector store client and
/// language model, and may contact the services to validate them.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &Credentials,
        config: &RagConfig,
        chunker: Arc<dyn Chunker>,
    ) -> Result<SessionBackends>;
}

/// Puts a session back into `fallback` unless [`commit`](Self::commit) is
/// called, so a failed or cancelled call never leaves a transient phase behind.
struct PhaseGuard<'a> {
    phase: &'a mut SessionPhase,
    fallback: SessionPhase,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a mut SessionPhase, during: SessionPhase, fallback: SessionPhase) -> Self {
        *phase = during;
        Self { phase, fallback }
    }

    fn commit(mut self, next: SessionPhase) {
        self.fallback = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase = self.fallback;
    }
}

/// An uploaded PDF file held in memory.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone)]
pub struct PdfUpload {
    /// The file name as uploaded.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// The explicit session context every pipeline call goes through.
///
/// Created per user, discarded with [`close`](Self::close); nothing is persisted.
pub struct RagSession {
    id: Uuid,
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    connector: Arc<dyn BackendConnector>,
    phase: SessionPhase,
    backends: Option<SessionBackends>,
    transcript: Vec<ConversationTurn>,
}

impl RagSession {
    /// Create an unconfigured session.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid.
    pub fn new(
        config: RagConfig,
        chunker: Arc<dyn Chunker>,
        connector: Arc<dyn BackendConnector>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            chunker,
            connector,
            phase: SessionPhase::Unconfigured,
            backends: None,
            transcript: Vec::new(),
        })
    }

    /// Session identifier, recorded as `session.id` in every log line.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Where the session is in its lifecycle.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The configuration the session was created with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The chat transcript, oldest turn first.
    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Supply the three credentials and connect to the external services.
    ///
    /// Reconfiguring a ready session drops its cached handles, so documents
    /// must be ingested again before asking. On failure the phase is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for blank credentials, or whatever
    /// the connector reports.
    pub async fn configure(&mut self, credentials: Credentials) -> Result<()> {
        let span = info_span!(
            "rag.session.configure",
            session.id = %self.id,
            index = %credentials.index_name
        );
        async {
            credentials.validate().inspect_err(|e| error!(error = %e, "invalid credentials"))?;

            let backends = self
                .connector
                .connect(&credentials, &self.config, Arc::clone(&self.chunker))
                .await
                .inspect_err(|e| error!(kind = e.kind().as_str(), error = %e, "connect failed"))?;

            self.backends = Some(backends);
            self.phase = SessionPhase::Configured;
            info!("session configured");
            Ok::<(), RagError>(())
        }
        .instrument(span)
        .await
    }

    /// Ingest a batch of documents: chunk → embed → upsert.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if the session is not configured
    /// - [`RagError::DocumentError`] if the batch contains no text to index
    ///   (the phase is unchanged)
    /// - any embedding or index error; the session returns to `Configured`
    ///   and entries already written stay in the index
    pub async fn ingest(&mut self, documents: &[Document]) -> Result<IngestReport> {
        let span = info_span!(
            "rag.session.ingest",
            session.id = %self.id,
            document_count = documents.len()
        );
        async {
            let pipeline = match (&self.phase, &self.backends) {
                (SessionPhase::Configured | SessionPhase::Ready, Some(backends)) => {
                    Arc::clone(&backends.pipeline)
                }
                _ => {
                    let err = RagError::ConfigError(
                        "supply the API keys and index name before uploading documents".to_string(),
                    );
                    error!(phase = ?self.phase, error = %err, "ingest rejected");
                    return Err(err);
                }
            };

            let chunks = pipeline.chunk_documents(documents);
            if chunks.is_empty() {
                let err = RagError::DocumentError {
                    source_name: "upload".to_string(),
                    message: "the uploaded documents contain no text".to_string(),
                };
                error!(error = %err, "nothing to ingest");
                return Err(err);
            }

            let guard =
                PhaseGuard::enter(&mut self.phase, SessionPhase::Ingesting, SessionPhase::Configured);
            match pipeline.index_chunks(chunks).await {
                Ok(stored) => {
                    guard.commit(SessionPhase::Ready);
                    let report = IngestReport {
                        document_count: documents.len(),
                        chunk_ids: stored.into_iter().map(|c| c.id).collect(),
                    };
                    info!(chunk_count = report.chunk_count(), "documents processed and indexed");
                    Ok(report)
                }
                Err(err) => {
                    drop(guard);
                    error!(kind = err.kind().as_str(), error = %err, "ingestion failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Extract text from uploaded PDFs page by page, then [`ingest`](Self::ingest) it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentError`] if a file cannot be read (the
    /// phase is unchanged), otherwise as [`ingest`](Self::ingest).
    #[cfg(feature = "pdf")]
    pub async fn ingest_pdfs(&mut self, uploads: &[PdfUpload]) -> Result<IngestReport> {
        let mut documents = Vec::new();
        for upload in uploads {
            let pages = crate::loader::PdfLoader::load_bytes(&upload.name, upload.bytes.clone())
                .await
                .inspect_err(|e| {
                    error!(session.id = %self.id, file = %upload.name, error = %e, "pdf extraction failed");
                })?;
            documents.extend(pages);
        }
        self.ingest(&documents).await
    }

    /// Answer `question` from the indexed documents.
    ///
    /// On success the question and answer are appended to the transcript, in
    /// that order. On failure nothing is appended and the session stays `Ready`.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if no documents have been ingested
    /// - any retrieval or synthesis error
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let span = info_span!("rag.session.ask", session.id = %self.id);
        async {
            let backends = match (&self.phase, &self.backends) {
                (SessionPhase::Ready, Some(backends)) => backends.clone(),
                _ => {
                    let err = RagError::ConfigError(
                        "configure the API keys and upload documents before asking".to_string(),
                    );
                    error!(phase = ?self.phase, error = %err, "question rejected");
                    return Err(err);
                }
            };

            let guard =
                PhaseGuard::enter(&mut self.phase, SessionPhase::Answering, SessionPhase::Ready);
            let result = answer(&backends, question, self.config.top_k).await;
            drop(guard);

            match result {
                Ok(answer) => {
                    self.transcript.push(ConversationTurn::user(question));
                    self.transcript.push(ConversationTurn::assistant(answer.clone()));
                    info!(turns = self.transcript.len(), "question answered");
                    Ok(answer)
                }
                Err(err) => {
                    error!(kind = err.kind().as_str(), error = %err, "answering failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// End the session, discarding handles and transcript.
    pub fn close(self) {
        info!(session.id = %self.id, turns = self.transcript.len(), "session closed");
    }
}

async fn answer(backends: &SessionBackends, question: &str, top_k: usize) -> Result<String> {
    let results = backends.pipeline.retrieve(question, top_k).await?;
    let passages: Vec<String> = results.into_iter().map(|r| r.chunk.text).collect();
    backends.synthesizer.synthesize(question, &passages).await
}
