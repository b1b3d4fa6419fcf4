//! Timeout bounding for external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{RagError, Result};

/// The external service a bounded call talks to. Decides which error a timeout becomes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stage<'a> {
    Embedding(&'a str),
    Index(&'a str),
    Synthesis(&'a str),
}

impl Stage<'_> {
    fn timeout_error(self, limit: Duration) -> RagError {
        let message = format!("request timed out after {limit:?}");
        match self {
            Stage::Embedding(provider) => {
                RagError::EmbeddingError { provider: provider.to_string(), message }
            }
            Stage::Index(backend) => RagError::index_unavailable(backend, message),
            Stage::Synthesis(provider) => {
                RagError::SynthesisError { provider: provider.to_string(), message }
            }
        }
    }
}

/// Await `future`, failing with the stage's error kind if it outlives `limit`.
///
/// Dropping the returned future cancels the inner call.
pub(crate) async fn with_deadline<T, F>(stage: Stage<'_>, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?stage, ?limit, "external call timed out");
            Err(stage.timeout_error(limit))
        }
    }
}
