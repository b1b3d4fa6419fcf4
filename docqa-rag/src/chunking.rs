//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: exact character windows with configurable overlap
//! - [`RecursiveChunker`]: prefers paragraph, line, sentence, then word
//!   boundaries, falling back to hard character cuts
//!
//! Sizes are counted in characters (Unicode scalar values), so a chunk never
//! ends inside a multi-byte code point.

use std::collections::VecDeque;

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Wrap raw chunk texts into [`Chunk`]s.
///
/// Chunk IDs are `{document_id}_{chunk_index}`; each chunk inherits the parent
/// document's metadata plus a `chunk_index` field.
fn build_chunks(document: &Document, texts: impl IntoIterator<Item = String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                text,
                embedding: Vec::new(),
                metadata,
                document_id: document.id.clone(),
            }
        })
        .collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `chars`-th character, or the end of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

/// Splits text into fixed-size character windows.
///
/// Window *i* starts at character `i * (chunk_size - chunk_overlap)` and spans
/// `chunk_size` characters, clipped at the end of the text. Every window but
/// the last has exactly `chunk_size` characters, and a text of length `L`
/// yields `ceil((L - chunk_overlap) / (chunk_size - chunk_overlap))` windows
/// (one window when `L <= chunk_size`).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let windows: Vec<&str> = chunker.split(&text).collect();
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Lazily split `text` into overlapping windows.
    ///
    /// The returned iterator is `Clone`; calling `split` again restarts from
    /// the beginning.
    pub fn split<'a>(&self, text: &'a str) -> CharWindows<'a> {
        CharWindows {
            text,
            next_start: (!text.is_empty()).then_some(0),
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
        }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        build_chunks(document, self.split(&document.text).map(str::to_string))
    }
}

/// Iterator over the windows produced by [`FixedSizeChunker::split`].
#[derive(Debug, Clone)]
pub struct CharWindows<'a> {
    text: &'a str,
    next_start: Option<usize>,
    chunk_size: usize,
    step: usize,
}

impl<'a> Iterator for CharWindows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let start = self.next_start?;
        let rest = &self.text[start..];
        let end = start + byte_offset(rest, self.chunk_size);

        self.next_start =
            if end >= self.text.len() { None } else { Some(start + byte_offset(rest, self.step)) };

        Some(&self.text[start..end])
    }
}

/// Separators tried in order; the empty separator means "cut between characters".
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// Splits text at the most natural boundary available.
///
/// The text is split at the first separator it contains (paragraphs, lines,
/// sentences, words, then single characters). Pieces are merged greedily
/// while they fit in `chunk_size`; when a chunk is emitted, its trailing pieces
/// totalling at most `chunk_overlap` characters start the next chunk. A piece
/// that is itself too long is split again with the next separator. Chunk
/// edges are trimmed of whitespace.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(800, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: maximum number of characters carried into the next chunk
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some(position) =
            separators.iter().position(|sep| sep.is_empty() || text.contains(sep))
        else {
            return split_chars(text).into_iter().map(str::to_string).collect();
        };
        let separator = separators[position];
        let remaining = &separators[position + 1..];

        let pieces = if separator.is_empty() {
            split_chars(text)
        } else {
            split_keeping_separator(text, separator)
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            chunks.extend(self.split_with(piece, remaining));
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Merge small pieces into chunks of at most `chunk_size` characters.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);
                // Keep only the tail that fits in the overlap and leaves room for `piece`.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    let Some((_, dropped)) = window.pop_front() else { break };
                    total -= dropped;
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            push_joined(&mut chunks, &window);
        }

        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn split_chars(text: &str) -> Vec<&str> {
    text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect()
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }
        build_chunks(document, self.split_text(&document.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_stays_with_preceding_segment() {
        assert_eq!(split_keeping_separator("a. b. c", ". "), vec!["a. ", "b. ", "c"]);
        assert_eq!(split_keeping_separator("no match", ". "), vec!["no match"]);
    }

    #[test]
    fn byte_offset_respects_multibyte_chars() {
        assert_eq!(byte_offset("héllo", 2), 3);
        assert_eq!(byte_offset("hé", 5), 3);
    }

    #[test]
    fn merge_carries_overlap_pieces() {
        let chunker = RecursiveChunker::new(10, 4).unwrap();
        let merged = chunker.merge(&["aaa ", "bbb ", "ccc ", "ddd"]);
        assert_eq!(merged, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }
}
