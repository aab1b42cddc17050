use super::fakes::{france_corpus, FixedIndex, MockLlm};
use crate::config::KnowledgeBaseConfig;
use crate::index::ScoredChunkSource;
use crate::service::{QaService, ServiceRegistry, INVALID_QUESTION_ANSWER, NO_RESULTS_ANSWER};
use docqa_core::AppError;
use docqa_llm::LlmClient;
use docqa_prompt::default_prompt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const QUESTION: &str = "What is the capital of France?";

fn service(index: Arc<dyn ScoredChunkSource>, llm: Arc<dyn LlmClient>) -> QaService {
    QaService::new(
        index,
        llm,
        &KnowledgeBaseConfig::default(),
        default_prompt(),
        "llama3.2",
    )
    .unwrap()
}

#[tokio::test]
async fn test_answer_full_pipeline() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let llm = Arc::new(MockLlm::replying(
        "ANSWER:\n- Paris is the capital of France.\n\nSOURCES: geo.md",
    ));
    let service = service(index, llm.clone());

    let response = service.answer(QUESTION, false, None).await.unwrap();

    assert_eq!(response.answer, "- Paris is the capital of France.");
    assert_eq!(response.query, QUESTION);
    assert!(!response.explain_mode);
    assert_eq!(response.similarity_scores, vec![0.2, 0.3, 0.4]);

    let breakdown = response.confidence_breakdown.unwrap();
    assert!((breakdown.best_similarity - 0.9).abs() < 1e-6);
    assert!((breakdown.keyword_match - 1.0).abs() < 1e-6);
    assert!(response.confidence_score > 0.85);
    assert_eq!(response.confidence_score, breakdown.final_score);

    assert_eq!(response.sources.len(), 3);
    assert_eq!(response.sources[0].source, "geo.md");
    assert_eq!(response.sources[0].file_path, "docs/geo.md");
    assert!((response.sources[0].similarity_score.unwrap() - 0.9).abs() < 1e-6);

    let prompt = llm.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("[Source: geo.md, Chunk 0]"));
    assert!(prompt.contains("Explain like I'm 10: No"));
}

#[tokio::test]
async fn test_blank_question_gets_canned_answer() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let llm = Arc::new(MockLlm::replying("unused"));
    let service = service(index.clone(), llm.clone());

    let response = service.answer("   ", true, None).await.unwrap();

    assert_eq!(response.answer, INVALID_QUESTION_ANSWER);
    assert_eq!(response.confidence_score, 0.0);
    assert!(response.explain_mode);
    assert_eq!(index.call_count(), 0);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_no_results_gets_canned_answer() {
    let llm = Arc::new(MockLlm::replying("unused"));
    let service = service(Arc::new(FixedIndex::empty()), llm.clone());

    let response = service.answer(QUESTION, false, None).await.unwrap();

    assert_eq!(response.answer, NO_RESULTS_ANSWER);
    assert_eq!(response.confidence_score, 0.0);
    assert!(response.sources.is_empty());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_is_an_error() {
    let service = service(
        Arc::new(FixedIndex::new(france_corpus())),
        Arc::new(MockLlm::failing()),
    );

    let err = service.answer(QUESTION, false, None).await.unwrap_err();
    assert!(matches!(err, AppError::Llm(_)));
}

#[tokio::test]
async fn test_top_k_override() {
    let index = Arc::new(FixedIndex::new(france_corpus()));
    let service = service(index, Arc::new(MockLlm::replying("ANSWER: ok")));

    let response = service.answer(QUESTION, false, Some(1)).await.unwrap();
    assert_eq!(response.sources.len(), 1);

    let breakdown = response.confidence_breakdown.unwrap();
    assert_eq!(breakdown.consistency, 1.0);
}

#[tokio::test]
async fn test_search_scores_without_generation() {
    let service = service(
        Arc::new(FixedIndex::new(france_corpus())),
        Arc::new(MockLlm::failing()),
    );

    let response = service.search(QUESTION, Some(2)).await;

    assert_eq!(response.sources.len(), 2);
    assert_eq!(response.similarity_scores, vec![0.2, 0.3]);
    assert!(response.confidence_score > 0.0);
}

#[tokio::test]
async fn test_search_on_empty_index_scores_zero() {
    let service = service(Arc::new(FixedIndex::empty()), Arc::new(MockLlm::failing()));

    let response = service.search(QUESTION, None).await;
    assert!(response.sources.is_empty());
    assert_eq!(response.confidence_score, 0.0);
}

#[test]
fn test_mismatched_metric_is_rejected() {
    let mut config = KnowledgeBaseConfig::default();
    config.retrieval.distance_metric = crate::index::DistanceMetric::L2;

    let result = QaService::new(
        Arc::new(FixedIndex::empty()),
        Arc::new(MockLlm::failing()),
        &config,
        default_prompt(),
        "llama3.2",
    );
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_registry_builds_once_and_invalidates() {
    let registry = ServiceRegistry::new();
    let counter = AtomicUsize::new(0);
    let builds = &counter;

    let build = move || async move {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok::<_, AppError>(service(
            Arc::new(FixedIndex::new(france_corpus())),
            Arc::new(MockLlm::replying("ANSWER: ok")),
        ))
    };

    let first = registry.get_or_try_insert("default", build).await.unwrap();
    let second = registry.get_or_try_insert("default", build).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);

    assert!(registry.invalidate("default"));
    assert!(registry.is_empty());
    assert!(!registry.invalidate("default"));
}

#[tokio::test]
async fn test_registry_does_not_cache_failures() {
    let registry = ServiceRegistry::new();

    let result = registry
        .get_or_try_insert("broken", || async {
            Err::<QaService, _>(AppError::Knowledge("no index".to_string()))
        })
        .await;

    assert!(result.is_err());
    assert!(registry.get("broken").is_none());
}
