//! In-memory vector store: search ordering, round trips, and dimension checks.

use std::collections::HashMap;

use docqa_rag::document::Chunk;
use docqa_rag::inmemory::InMemoryVectorStore;
use docqa_rag::vectorstore::VectorStore;
use docqa_rag::RagError;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z0-9]{1,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| chunk(&id, &text, embedding),
    )
}

fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        embedding,
        metadata: HashMap::new(),
        document_id: "doc_1".to_string(),
    }
}

fn dedup(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen: HashMap<String, Chunk> = HashMap::new();
    for chunk in chunks {
        seen.entry(chunk.id.clone()).or_insert(chunk);
    }
    seen.into_values().collect()
}

mod prop_inmemory_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let unique = dedup(chunks);
            let count = unique.len();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();
                store.upsert("test", &unique).await.unwrap();
                store.search("test", &query, top_k).await.unwrap()
            });

            // k larger than the store returns everything
            prop_assert_eq!(results.len(), top_k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn querying_with_an_entrys_own_vector_ranks_it_first(
            chunks in proptest::collection::vec(arb_chunk(DIM), 0..15),
            own in arb_normalized_embedding(DIM),
        ) {
            let mut unique: Vec<Chunk> =
                dedup(chunks).into_iter().filter(|c| c.id != "42").collect();
            unique.push(chunk("42", "the answer", own.clone()));

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();
                store.upsert("test", &unique).await.unwrap();
                store.search("test", &own, unique.len()).await.unwrap()
            });

            let top_score = results[0].score;
            let hit = results.iter().find(|r| r.chunk.id == "42").unwrap();
            prop_assert!((hit.score - top_score).abs() < 1e-5, "42 scored {} but top was {}", hit.score, top_score);
        }
    }
}

#[tokio::test]
async fn upsert_overwrites_entries_with_the_same_id() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2).await.unwrap();
    store.upsert("docs", &[chunk("a_0", "old", vec![1.0, 0.0])]).await.unwrap();
    store.upsert("docs", &[chunk("a_0", "new", vec![0.0, 1.0])]).await.unwrap();

    assert_eq!(store.count("docs").await, Some(1));
    assert_eq!(store.get("docs", "a_0").await.unwrap().text, "new");
}

#[tokio::test]
async fn mismatched_dimensions_are_rejected_without_writing() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 3).await.unwrap();

    let err = store
        .upsert("docs", &[chunk("ok", "fits", vec![1.0, 0.0, 0.0]), chunk("bad", "too short", vec![1.0])])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));
    assert_eq!(store.count("docs").await, Some(0));

    let err = store.search("docs", &[1.0, 0.0], 1).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));

    let err = store.create_collection("docs", 4).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4 }));
}

#[tokio::test]
async fn unknown_collection_is_unavailable() {
    let store = InMemoryVectorStore::new();
    let err = store.search("missing", &[1.0], 1).await.unwrap_err();
    assert!(matches!(err, RagError::IndexUnavailable { .. }));
}

#[tokio::test]
async fn delete_removes_entries_and_collections() {
    let store = InMemoryVectorStore::new();
    store.create_collection("docs", 2).await.unwrap();
    store
        .upsert("docs", &[chunk("a", "x", vec![1.0, 0.0]), chunk("b", "y", vec![0.0, 1.0])])
        .await
        .unwrap();

    store.delete("docs", &["a"]).await.unwrap();
    assert_eq!(store.count("docs").await, Some(1));

    store.delete_collection("docs").await.unwrap();
    assert_eq!(store.count("docs").await, None);
}
