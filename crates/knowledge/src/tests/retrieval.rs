use super::fakes::{doc, france_corpus, FixedIndex, FlakyIndex};
use crate::config::RetrievalConfig;
use crate::index::ScoredChunkSource;
use crate::keywords::extract_keywords;
use crate::retriever::HybridRetriever;
use std::sync::Arc;

const QUESTION: &str = "What is the capital of France?";

fn retriever(index: Arc<dyn ScoredChunkSource>) -> HybridRetriever {
    HybridRetriever::new(index, RetrievalConfig::default()).unwrap()
}

#[tokio::test]
async fn test_blank_query_skips_index() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let retriever = retriever(index.clone());

    assert!(retriever.retrieve_with_scores("   ", 5).await.is_empty());
    assert!(retriever.retrieve_with_scores("", 5).await.is_empty());
    assert!(retriever.retrieve("  \t", 5).await.is_empty());
    assert_eq!(index.call_count(), 0);
}

#[tokio::test]
async fn test_zero_k_skips_index() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let retriever = retriever(index.clone());

    assert!(retriever.retrieve_with_scores(QUESTION, 0).await.is_empty());
    assert_eq!(index.call_count(), 0);
}

#[tokio::test]
async fn test_searches_expanded_query_for_candidates() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let retriever = retriever(index.clone());

    let result = retriever.retrieve_with_scores(QUESTION, 5).await;

    assert_eq!(result.len(), 3);
    assert_eq!(
        index.recorded(),
        vec![(
            "What is the capital of France? capital france".to_string(),
            15
        )]
    );
}

#[tokio::test]
async fn test_candidate_count_is_capped() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let retriever = retriever(index.clone());

    retriever.retrieve_with_scores(QUESTION, 10).await;
    assert_eq!(index.recorded()[0].1, 20);
}

#[tokio::test]
async fn test_empty_expanded_search_retries_raw_query() {
    let index = Arc::new(FixedIndex::new(france_corpus()).empty_for("capital france"));
    let retriever = retriever(index.clone());

    let result = retriever.retrieve_with_scores(QUESTION, 2).await;

    assert_eq!(result.len(), 2);
    let recorded = index.recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1], (QUESTION.to_string(), 6));
}

#[tokio::test]
async fn test_empty_index_yields_empty_result() {
    let index = Arc::new(FixedIndex::empty());
    let retriever = retriever(index.clone());

    assert!(retriever.retrieve_with_scores(QUESTION, 5).await.is_empty());
    // Expanded search, then the raw retry.
    assert_eq!(index.call_count(), 2);
}

#[tokio::test]
async fn test_index_error_falls_back_to_plain_search() {
    let index = Arc::new(FlakyIndex::new(france_corpus(), 1));
    let retriever = retriever(index.clone());

    let result = retriever.retrieve_with_scores(QUESTION, 2).await;

    assert_eq!(result.distances(), vec![0.2, 0.3]);
    assert_eq!(index.recorded()[1], (QUESTION.to_string(), 2));
}

#[tokio::test]
async fn test_failed_fallback_yields_empty_result() {
    let index = Arc::new(FlakyIndex::new(france_corpus(), 2));
    let retriever = retriever(index.clone());

    assert!(retriever.retrieve_with_scores(QUESTION, 2).await.is_empty());
    assert_eq!(index.recorded().len(), 2);
}

#[tokio::test]
async fn test_keyword_overlap_outranks_slightly_nearer_chunk() {
    let index = Arc::new(FixedIndex::new(vec![
        (doc("Baguettes are baked daily in bakeries.", "food.md", 0), 0.30),
        (doc("Paris is the capital of France.", "geo.md", 0), 0.40),
    ]));
    let retriever = retriever(index);

    let result = retriever.retrieve_with_scores(QUESTION, 2).await;
    let items = result.items();

    assert_eq!(items[0].0.content, "Paris is the capital of France.");
    // Raw distances are propagated, not similarities.
    assert_eq!(items[0].1, 0.40);
    assert_eq!(items[1].1, 0.30);
}

#[tokio::test]
async fn test_results_are_truncated_to_k() {
    let corpus: Vec<_> = (0..12)
        .map(|i| (doc(&format!("capital fact {}", i), "facts.md", i), 0.05 * i as f32))
        .collect();
    let index = Arc::new(FixedIndex::new(corpus));
    let retriever = retriever(index);

    assert_eq!(retriever.retrieve_with_scores(QUESTION, 4).await.len(), 4);
    assert_eq!(retriever.retrieve(QUESTION, 4).await.len(), 4);
}

#[tokio::test]
async fn test_combined_scores_are_reconstructible() {
    let index = Arc::new(FixedIndex::new(vec![
        (doc("Paris is the capital of France.", "geo.md", 0), 0.6),
        (doc("Capital gains tax rules.", "tax.md", 0), 0.2),
        (doc("Weather in Lyon.", "weather.md", 0), 0.1),
    ]));
    let retriever = retriever(index);
    let keywords = extract_keywords(QUESTION);

    let result = retriever.retrieve_with_scores(QUESTION, 3).await;

    let combined: Vec<f32> = result
        .items()
        .iter()
        .map(|(chunk, distance)| {
            let similarity = 1.0 - (distance / 2.0).min(1.0);
            let lower = chunk.content.to_lowercase();
            let matched = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            0.7 * similarity + 0.3 * matched as f32 / keywords.len() as f32
        })
        .collect();

    for pair in combined.windows(2) {
        assert!(pair[0] >= pair[1], "not sorted: {:?}", combined);
    }
}
