use super::fakes::{doc, FixedIndex};
use crate::confidence::{ConfidenceScorer, ConfidenceWeights};
use crate::config::RetrievalConfig;
use crate::index::DistanceMetric;
use crate::keywords::extract_keywords;
use crate::retriever::{rerank, HybridRetriever};
use crate::types::Chunk;
use proptest::prelude::*;
use std::sync::Arc;

fn scorer() -> ConfidenceScorer {
    ConfidenceScorer::new(ConfidenceWeights::default(), DistanceMetric::CosineDistance).unwrap()
}

const WORDS: &[&str] = &[
    "capital", "france", "paris", "refund", "policy", "rust", "memory", "the", "of", "is",
];

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..8).prop_map(|words| words.join(" "))
}

fn candidates() -> impl Strategy<Value = Vec<(Chunk, f32)>> {
    prop::collection::vec((text(), 0.0f32..2.5), 0..15).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (content, d))| (doc(&content, "p.md", i as u32), d))
            .collect()
    })
}

proptest! {
    #[test]
    fn confidence_is_bounded(
        distances in prop::collection::vec(0.0f32..4.0, 0..10),
        query in text(),
        content in text(),
    ) {
        let chunks: Vec<Chunk> = distances.iter().map(|_| Chunk::new(content.clone())).collect();
        let b = scorer().score(&distances, &chunks, &query);

        for value in [b.best_similarity, b.avg_similarity, b.consistency, b.keyword_match, b.final_score] {
            prop_assert!((0.0..=1.0).contains(&value), "{:?}", b);
        }
    }

    #[test]
    fn single_chunk_is_fully_consistent(d in 0.0f32..2.0, query in text()) {
        let b = scorer().score(&[d], &[Chunk::new("x")], &query);
        prop_assert_eq!(b.consistency, 1.0);
    }

    #[test]
    fn confidence_monotone_in_best_distance(
        d1 in 0.0f32..2.0,
        d2 in 0.0f32..2.0,
        query in text(),
        content in text(),
    ) {
        let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        let chunks = vec![Chunk::new(content)];

        let closer = scorer().score(&[near], &chunks, &query);
        let further = scorer().score(&[far], &chunks, &query);

        prop_assert!(closer.best_similarity >= further.best_similarity);
        prop_assert!(closer.final_score >= further.final_score);
    }

    #[test]
    fn confidence_is_deterministic(
        distances in prop::collection::vec(0.0f32..2.0, 0..6),
        query in text(),
        content in text(),
    ) {
        let chunks: Vec<Chunk> = distances.iter().map(|_| Chunk::new(content.clone())).collect();
        prop_assert_eq!(
            scorer().score(&distances, &chunks, &query),
            scorer().score(&distances, &chunks, &query)
        );
    }

    #[test]
    fn rerank_sorted_and_bounded(items in candidates(), query in text(), k in 0usize..10) {
        let keywords = extract_keywords(&query);
        let available = items.len();
        let ranked = rerank(items, &keywords, &RetrievalConfig::default(), 2.0, k);

        prop_assert_eq!(ranked.len(), k.min(available));
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].combined >= pair[1].combined);
        }
        for scored in &ranked {
            let expected = 0.7 * scored.similarity + 0.3 * scored.keyword_match;
            prop_assert!((scored.combined - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn retrieval_returns_at_most_k(items in candidates(), k in 1usize..8) {
        let available = items.len();
        let index = Arc::new(FixedIndex::new(items));
        let retriever = HybridRetriever::new(index, RetrievalConfig::default()).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(retriever.retrieve_with_scores("capital of france policy", k));

        prop_assert_eq!(result.len(), k.min(available));
    }
}
