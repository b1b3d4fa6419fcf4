//! PDF loading: one [`Document`] per page.
//!
//! Available with the `pdf` feature. Extraction runs on tokio's blocking
//! pool because `pdf-extract` is synchronous and CPU-bound.

use std::path::Path;

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Turns PDF files into per-page documents.
///
/// Each page becomes a [`Document`] with id `{file}-p{page}` (pages are
/// 1-based), `source_uri` set to the file name, and `source` / `page`
/// metadata. Pages without extractable text are skipped.
pub struct PdfLoader;

impl PdfLoader {
    /// Extract the pages of an in-memory PDF.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentError`] if the bytes are not a readable
    /// PDF, including when the extractor panics on malformed input.
    pub async fn load_bytes(name: &str, bytes: Vec<u8>) -> Result<Vec<Document>> {
        let source_name = name.to_string();
        let pages =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
                .await
                .map_err(|e| RagError::DocumentError {
                    source_name: source_name.clone(),
                    message: format!("extraction aborted: {e}"),
                })?
                .map_err(|e| RagError::DocumentError {
                    source_name: source_name.clone(),
                    message: format!("PDF extraction error: {e}"),
                })?;

        let documents = pages_to_documents(&source_name, pages);
        if documents.is_empty() {
            warn!(file = %source_name, "PDF contains no extractable text");
        }
        debug!(file = %source_name, page_count = documents.len(), "loaded PDF");
        Ok(documents)
    }

    /// Read and extract a PDF from disk.
    pub async fn load_path(path: &Path) -> Result<Vec<Document>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::DocumentError {
            source_name: name.clone(),
            message: format!("failed to read file: {e}"),
        })?;
        Self::load_bytes(&name, bytes).await
    }

    /// Load every `.pdf` file directly inside `dir`, in file-name order.
    pub async fn load_dir(dir: &Path) -> Result<Vec<Document>> {
        let dir_error = |e: std::io::Error| RagError::DocumentError {
            source_name: dir.display().to_string(),
            message: format!("failed to read directory: {e}"),
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(dir_error)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
            let path = entry.path();
            let is_pdf =
                path.extension().is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"));
            if is_pdf {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            documents.extend(Self::load_path(&path).await?);
        }
        Ok(documents)
    }
}

fn pages_to_documents(source_name: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| {
            let page = i + 1;
            Document::new(format!("{source_name}-p{page}"), text)
                .with_source(source_name)
                .with_metadata("source", source_name)
                .with_metadata("page", page.to_string())
        })
        .collect()
}
