//! Hybrid retrieval: vector search re-ranked by keyword overlap.

use crate::config::RetrievalConfig;
use crate::index::ScoredChunkSource;
use crate::keywords::{expand_with, extract_keywords};
use crate::types::{Chunk, RetrievalResult, ScoredChunk, SourceInfo, UNKNOWN_SOURCE};
use docqa_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Characters of the query kept in log lines.
const LOG_QUERY_CHARS: usize = 50;

/// Characters of chunk content kept in source previews.
const PREVIEW_CHARS: usize = 300;

/// Retrieves chunks for a query and re-ranks them by a blend of vector
/// similarity and keyword coverage.
pub struct HybridRetriever {
    index: Arc<dyn ScoredChunkSource>,
    config: RetrievalConfig,
    ceiling: f32,
}

impl HybridRetriever {
    /// Create a retriever over `index`.
    ///
    /// Fails if the configured distance metric differs from the index's, or
    /// has no bounded range to normalize against.
    pub fn new(index: Arc<dyn ScoredChunkSource>, config: RetrievalConfig) -> AppResult<Self> {
        let ceiling = config.distance_metric.checked_ceiling()?;

        if index.metric() != config.distance_metric {
            return Err(AppError::Config(format!(
                "Retrieval is configured for '{}' distances but the index reports '{}'",
                config.distance_metric.as_str(),
                index.metric().as_str()
            )));
        }

        Ok(Self {
            index,
            config,
            ceiling,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Upper bound of the index's distance range.
    pub fn distance_ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Retrieve up to `k` chunks with their raw distances, best first.
    ///
    /// Never fails: index errors fall back to a plain search, and a failing
    /// fallback yields an empty result.
    pub async fn retrieve_with_scores(&self, query: &str, k: usize) -> RetrievalResult {
        if query.trim().is_empty() || k == 0 {
            return RetrievalResult::empty();
        }

        let short = truncate_for_log(query);

        match self.hybrid_search(query, k).await {
            Ok(result) => {
                if result.is_empty() {
                    tracing::warn!(query = %short, "No documents retrieved");
                } else {
                    tracing::info!(query = %short, count = result.len(), "Retrieved chunks");
                }
                result
            }
            Err(e) => {
                tracing::error!(query = %short, error = %e, "Error retrieving documents, falling back to plain search");
                match self.index.similarity_search_with_score(query, k).await {
                    Ok(mut items) => {
                        items.truncate(k);
                        RetrievalResult::from(items)
                    }
                    Err(e) => {
                        tracing::error!(query = %short, error = %e, "Plain search failed");
                        RetrievalResult::empty()
                    }
                }
            }
        }
    }

    async fn hybrid_search(&self, query: &str, k: usize) -> AppResult<RetrievalResult> {
        let keywords = extract_keywords(query);
        let candidates_k = self.config.candidate_count(k);
        let expanded = expand_with(query, &keywords);

        let mut candidates = self
            .index
            .similarity_search_with_score(&expanded, candidates_k)
            .await?;

        if candidates.is_empty() && expanded != query {
            tracing::debug!("Expanded query found nothing, retrying with raw query");
            candidates = self
                .index
                .similarity_search_with_score(query, candidates_k)
                .await?;
        }

        if candidates.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let ranked = rerank(candidates, &keywords, &self.config, self.ceiling, k);

        for scored in &ranked {
            tracing::debug!(
                distance = scored.distance,
                similarity = scored.similarity,
                keyword_match = scored.keyword_match,
                combined = scored.combined,
                "Ranked candidate"
            );
        }

        Ok(RetrievalResult::from(
            ranked
                .into_iter()
                .map(|s| (s.chunk, s.distance))
                .collect::<Vec<_>>(),
        ))
    }

    /// Plain vector search without re-ranking. Blank queries and index
    /// errors yield no chunks.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<Chunk> {
        if query.trim().is_empty() || k == 0 {
            return Vec::new();
        }

        match self.index.similarity_search_with_score(query, k).await {
            Ok(items) => items.into_iter().take(k).map(|(chunk, _)| chunk).collect(),
            Err(e) => {
                tracing::error!(query = %truncate_for_log(query), error = %e, "Error retrieving documents");
                Vec::new()
            }
        }
    }
}

/// Map a raw distance into [0, 1], 1 being identical.
///
/// Non-positive distances count as exact matches.
pub fn distance_to_similarity(distance: f32, ceiling: f32) -> f32 {
    if distance > 0.0 {
        1.0 - (distance / ceiling).min(1.0)
    } else {
        1.0
    }
}

/// Fraction of keywords occurring as substrings of the lowercased content.
pub fn keyword_match_score(content: &str, keywords: &[String]) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let lower = content.to_lowercase();
    let matches = keywords.iter().filter(|kw| lower.contains(kw.as_str())).count();
    matches as f32 / keywords.len() as f32
}

/// Score candidates and keep the best `k`.
///
/// The sort is stable, so equal scores keep the index's order.
pub fn rerank(
    candidates: Vec<(Chunk, f32)>,
    keywords: &[String],
    config: &RetrievalConfig,
    ceiling: f32,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|(chunk, distance)| {
            let similarity = distance_to_similarity(distance, ceiling);
            let keyword_match = keyword_match_score(&chunk.content, keywords);
            let combined =
                config.similarity_weight * similarity + config.keyword_weight * keyword_match;
            ScoredChunk {
                chunk,
                distance,
                similarity,
                keyword_match,
                combined,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

/// Render chunks as a context block for the answer prompt.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let source = chunk.source.as_deref().unwrap_or(UNKNOWN_SOURCE);
            let chunk_index = chunk.chunk_index.unwrap_or(i as u32 + 1);
            format!(
                "[Source: {}, Chunk {}]\n{}\n",
                source, chunk_index, chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Describe where each chunk came from.
pub fn source_metadata(chunks: &[Chunk]) -> Vec<SourceInfo> {
    chunks
        .iter()
        .map(|chunk| {
            let file_path = chunk
                .file_path
                .clone()
                .or_else(|| chunk.source.clone())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

            let source = if file_path != UNKNOWN_SOURCE {
                Path::new(&file_path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_path.clone())
            } else {
                chunk
                    .source
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
            };

            SourceInfo {
                source,
                chunk_index: chunk.chunk_index.unwrap_or(0),
                file_path,
                content_preview: preview(&chunk.content),
                similarity_score: None,
            }
        })
        .collect()
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn truncate_for_log(query: &str) -> String {
    match query.char_indices().nth(LOG_QUERY_CHARS) {
        Some((cut, _)) => format!("{}...", &query[..cut]),
        None => query.to_string(),
    }
}
