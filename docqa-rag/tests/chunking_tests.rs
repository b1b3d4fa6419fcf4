//! Chunking window counts, overlap, and boundary preference.

use docqa_rag::{Chunker, Document, FixedSizeChunker, RagError, RecursiveChunker};
use proptest::prelude::*;

/// Expected number of windows for a text of `len` characters.
fn expected_windows(len: usize, size: usize, overlap: usize) -> usize {
    if len == 0 {
        0
    } else if len <= size {
        1
    } else {
        (len - overlap).div_ceil(size - overlap)
    }
}

/// Arbitrary `(chunk_size, chunk_overlap)` with `chunk_size > chunk_overlap >= 0`.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

mod prop_fixed_size_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn window_count_and_lengths(
            (size, overlap) in arb_sizes(),
            text in "[a-zé€ \n]{0,300}",
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let windows: Vec<&str> = chunker.split(&text).collect();
            let len = text.chars().count();

            prop_assert_eq!(windows.len(), expected_windows(len, size, overlap));
            if let Some((last, rest)) = windows.split_last() {
                for window in rest {
                    prop_assert_eq!(window.chars().count(), size);
                }
                prop_assert!(last.chars().count() <= size);
                prop_assert!(text.ends_with(last));
            }
        }

        #[test]
        fn window_starts_advance_by_step(
            (size, overlap) in arb_sizes(),
            text in "[a-z]{1,200}",
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chars: Vec<char> = text.chars().collect();
            for (i, window) in chunker.split(&text).enumerate() {
                let start = i * (size - overlap);
                let end = (start + size).min(chars.len());
                let expected: String = chars[start..end].iter().collect();
                prop_assert_eq!(window, expected.as_str());
            }
        }

        #[test]
        fn overlap_not_smaller_than_size_is_rejected(
            size in 0usize..64,
            extra in 0usize..8,
        ) {
            let overlap = size + extra;
            prop_assert!(matches!(
                FixedSizeChunker::new(size, overlap),
                Err(RagError::ConfigError(_))
            ));
            prop_assert!(matches!(
                RecursiveChunker::new(size, overlap),
                Err(RagError::ConfigError(_))
            ));
        }

        #[test]
        fn recursive_chunks_fit_and_cover_every_word(
            (size, overlap) in (8usize..80).prop_flat_map(|s| (Just(s), 0..s / 2)),
            words in proptest::collection::vec("[a-z]{1,7}", 1..60),
        ) {
            let text = words.join(" ");
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text);

            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= size, "chunk too long: {:?}", chunk);
                prop_assert!(!chunk.is_empty());
            }
            let joined = chunks.join(" ");
            for word in &words {
                prop_assert!(joined.contains(word.as_str()));
            }
        }
    }
}

#[test]
fn split_is_restartable() {
    let chunker = FixedSizeChunker::new(4, 1).unwrap();
    let windows = chunker.split("abcdefghij");
    let first: Vec<&str> = windows.clone().collect();
    let second: Vec<&str> = windows.collect();
    assert_eq!(first, vec!["abcd", "defg", "ghij"]);
    assert_eq!(first, second);
}

#[test]
fn empty_text_has_no_chunks() {
    let doc = Document::new("empty", "");
    assert!(FixedSizeChunker::new(10, 2).unwrap().chunk(&doc).is_empty());
    assert!(RecursiveChunker::new(10, 2).unwrap().chunk(&doc).is_empty());
}

#[test]
fn chunk_ids_and_metadata_come_from_the_document() {
    let doc = Document::new("manual.pdf-p2", "abcdefghij").with_metadata("page", "2");
    let chunks = FixedSizeChunker::new(6, 2).unwrap().chunk(&doc);

    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["manual.pdf-p2_0", "manual.pdf-p2_1"]);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.document_id, "manual.pdf-p2");
        assert_eq!(chunk.metadata["page"], "2");
        assert_eq!(chunk.metadata["chunk_index"], i.to_string());
        assert!(chunk.embedding.is_empty());
    }
}

#[test]
fn recursive_prefers_sentence_boundaries() {
    let text = "The capital of France is Paris and it sits on the Seine. \
                The tallest mountain in Japan is Mount Fuji at 3776 metres.";
    let chunks = RecursiveChunker::new(60, 10).unwrap().split_text(text);
    assert_eq!(
        chunks,
        vec![
            "The capital of France is Paris and it sits on the Seine.",
            "The tallest mountain in Japan is Mount Fuji at 3776 metres.",
        ]
    );
}

#[test]
fn recursive_prefers_paragraphs_over_lines() {
    let text = "first paragraph line one\nline two\n\nsecond paragraph";
    let chunks = RecursiveChunker::new(40, 0).unwrap().split_text(text);
    assert_eq!(chunks, vec!["first paragraph line one\nline two", "second paragraph"]);
}

#[test]
fn recursive_falls_back_to_character_cuts() {
    let chunks = RecursiveChunker::new(4, 0).unwrap().split_text("abcdefghij");
    assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
}
