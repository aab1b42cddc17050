//! Question answering over a knowledge base.
//!
//! [`QaService`] wires retrieval, confidence scoring and answer composition
//! together. Hosts construct it explicitly and may cache instances per base
//! in a [`ServiceRegistry`].

use crate::composer::AnswerComposer;
use crate::confidence::ConfidenceScorer;
use crate::config::KnowledgeBaseConfig;
use crate::index::ScoredChunkSource;
use crate::retriever::{distance_to_similarity, format_context, source_metadata, HybridRetriever};
use crate::types::{QueryResponse, RetrievalResult, SearchResponse, SourceInfo};
use chrono::Utc;
use docqa_core::AppResult;
use docqa_llm::LlmClient;
use docqa_prompt::PromptDefinition;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

pub const INVALID_QUESTION_ANSWER: &str = "Please provide a valid question.";

pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in the knowledge base. Please make sure documents have been uploaded and processed.";

/// Retrieval, confidence and answer generation for one knowledge base.
pub struct QaService {
    retriever: HybridRetriever,
    scorer: ConfidenceScorer,
    composer: AnswerComposer,
    default_top_k: usize,
}

impl QaService {
    pub fn new(
        index: Arc<dyn ScoredChunkSource>,
        llm: Arc<dyn LlmClient>,
        config: &KnowledgeBaseConfig,
        prompt: PromptDefinition,
        model: impl Into<String>,
    ) -> AppResult<Self> {
        let retriever = HybridRetriever::new(index, config.retrieval.clone())?;
        let scorer = ConfidenceScorer::new(
            config.confidence.clone(),
            config.retrieval.distance_metric,
        )?;
        let composer = AnswerComposer::new(llm, prompt, model, config.generation.clone());

        Ok(Self {
            retriever,
            scorer,
            composer,
            default_top_k: config.retrieval.top_k,
        })
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Answer a question from retrieved context.
    ///
    /// Blank questions and empty retrievals get a fixed answer with zero
    /// confidence. Generation failures are returned as errors.
    pub async fn answer(
        &self,
        question: &str,
        explain_mode: bool,
        top_k: Option<usize>,
    ) -> AppResult<QueryResponse> {
        if question.trim().is_empty() {
            return Ok(QueryResponse::canned(
                INVALID_QUESTION_ANSWER,
                question,
                explain_mode,
            ));
        }

        let k = top_k.unwrap_or(self.default_top_k);
        let result = self.retriever.retrieve_with_scores(question, k).await;

        if result.is_empty() {
            return Ok(QueryResponse::canned(NO_RESULTS_ANSWER, question, explain_mode));
        }

        let chunks = result.chunks();
        let distances = result.distances();
        let breakdown = self.scorer.score(&distances, &chunks, question);

        tracing::info!(
            chunks = chunks.len(),
            confidence = breakdown.final_score,
            "Scored retrieval"
        );

        let context = format_context(&chunks);
        let answer = self
            .composer
            .compose(question, &context, explain_mode)
            .await?;

        Ok(QueryResponse {
            answer,
            sources: self.scored_sources(&result),
            confidence_score: breakdown.final_score,
            confidence_breakdown: Some(breakdown),
            similarity_scores: distances,
            query: question.to_string(),
            timestamp: Utc::now(),
            explain_mode,
        })
    }

    /// Retrieve and score without generating an answer.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> SearchResponse {
        let k = top_k.unwrap_or(self.default_top_k);
        let result = self.retriever.retrieve_with_scores(query, k).await;

        let chunks = result.chunks();
        let distances = result.distances();
        let breakdown = self.scorer.score(&distances, &chunks, query);

        SearchResponse {
            query: query.to_string(),
            sources: self.scored_sources(&result),
            confidence_score: breakdown.final_score,
            confidence_breakdown: breakdown,
            similarity_scores: distances,
        }
    }

    fn scored_sources(&self, result: &RetrievalResult) -> Vec<SourceInfo> {
        let ceiling = self.retriever.distance_ceiling();
        let mut sources = source_metadata(&result.chunks());
        for (source, distance) in sources.iter_mut().zip(result.distances()) {
            source.similarity_score = Some(distance_to_similarity(distance, ceiling));
        }
        sources
    }
}

/// Cache of constructed services keyed by knowledge base name.
///
/// Owned by the host; nothing in this crate holds services globally.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<QaService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, base_name: &str) -> Option<Arc<QaService>> {
        self.services
            .read()
            .ok()
            .and_then(|services| services.get(base_name).cloned())
    }

    /// Return the cached service for `base_name`, building it on first use.
    ///
    /// A failed build is not cached.
    pub async fn get_or_try_insert<F, Fut>(
        &self,
        base_name: &str,
        build: F,
    ) -> AppResult<Arc<QaService>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<QaService>>,
    {
        if let Some(service) = self.get(base_name) {
            return Ok(service);
        }

        let service = Arc::new(build().await?);
        tracing::debug!(base = base_name, "Initialized QA service");

        let mut services = self
            .services
            .write()
            .map_err(|_| docqa_core::AppError::Other("Service registry lock poisoned".to_string()))?;
        // Another caller may have raced us; keep the first instance.
        Ok(services
            .entry(base_name.to_string())
            .or_insert(service)
            .clone())
    }

    /// Drop the cached service for `base_name`, e.g. after re-ingestion.
    pub fn invalidate(&self, base_name: &str) -> bool {
        self.services
            .write()
            .map(|mut services| services.remove(base_name).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.services.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
