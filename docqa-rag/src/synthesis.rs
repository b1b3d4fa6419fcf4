//! Answer synthesis: put every retrieved passage into one prompt and ask a language model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::deadline::{Stage, with_deadline};
use crate::error::{RagError, Result};

/// A text-completion language model.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Model or provider name used in errors and logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    ///
    /// Failures are reported as [`RagError::SynthesisError`] carrying the
    /// provider's message unchanged.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const INSTRUCTION: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build the question-answering prompt around `passages`.
///
/// Passages are inserted in retrieval order, separated by blank lines.
pub fn build_prompt(question: &str, passages: &[String]) -> String {
    let context = passages.join("\n\n");
    format!("{INSTRUCTION}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

/// Answers a question from retrieved passages with a single model call.
///
/// All passages go into one prompt, so `top_k * chunk_size` has to fit in the
/// model's input window. An oversized prompt surfaces as the provider's
/// context-length error.
#[derive(Clone)]
pub struct StuffSynthesizer {
    llm: Arc<dyn Llm>,
    request_timeout: Duration,
}

impl StuffSynthesizer {
    /// Create a synthesizer with a 30 second timeout.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm, request_timeout: Duration::from_secs(30) }
    }

    /// Set the timeout for the model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Produce an answer to `question` grounded in `passages`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SynthesisError`] if the model call fails or times
    /// out. There is no retry.
    pub async fn synthesize(&self, question: &str, passages: &[String]) -> Result<String> {
        let prompt = build_prompt(question, passages);
        let provider = self.llm.name();
        debug!(provider, passage_count = passages.len(), prompt_len = prompt.len(), "synthesizing");

        let answer =
            with_deadline(Stage::Synthesis(provider), self.request_timeout, self.llm.generate(&prompt))
                .await
                .map_err(|e| match e {
                    RagError::SynthesisError { .. } => e,
                    other => RagError::SynthesisError {
                        provider: provider.to_string(),
                        message: other.to_string(),
                    },
                })
                .inspect_err(|e| error!(provider, error = %e, "synthesis failed"))?;

        Ok(answer.trim().to_string())
    }
}
