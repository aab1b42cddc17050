//! Document question answering over local knowledge bases.
//!
//! Documents are ingested into a per-base SQLite index. Questions are
//! answered from retrieved chunks, re-ranked by keyword overlap, with a
//! confidence score computed from retrieval statistics.

pub mod chunker;
pub mod composer;
pub mod confidence;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod keywords;
pub mod parser;
pub mod retriever;
pub mod service;
pub mod sources;
pub mod sqlite_index;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use composer::{parse_answer, AnswerComposer};
pub use confidence::{ConfidenceScorer, ConfidenceWeights};
pub use config::{GenerationConfig, KnowledgeBaseConfig, RetrievalConfig};
pub use index::{DistanceMetric, ScoredChunkSource};
pub use ingest::ingest;
pub use keywords::{expand_query, extract_keywords};
pub use retriever::HybridRetriever;
pub use service::{QaService, ServiceRegistry};
pub use sources::SourceRegistry;
pub use sqlite_index::SqliteIndex;
pub use types::{
    BaseStats, Chunk, ConfidenceBreakdown, IngestOptions, IngestStats, KnowledgeSource,
    QueryResponse, RetrievalResult, SearchResponse, SourceInfo,
};

use docqa_core::{AppError, AppResult};
use docqa_llm::LlmClient;
use std::path::Path;
use std::sync::Arc;

/// Open a base's index with its configured embedding provider.
pub fn open_index(
    workspace: &Path,
    config: &KnowledgeBaseConfig,
    default_endpoint: Option<&str>,
) -> AppResult<Arc<SqliteIndex>> {
    let embedder = embeddings::create_provider(&config.embedding, default_endpoint)?;
    let index_path = config::get_index_path(workspace, &config.name);
    Ok(Arc::new(SqliteIndex::open(
        &index_path,
        embedder,
        &config.embedding,
    )?))
}

/// Construct the question answering service for a base.
///
/// Fails if the base has never been ingested.
pub fn build_service(
    workspace: &Path,
    base_name: &str,
    llm: Arc<dyn LlmClient>,
    model: &str,
    default_endpoint: Option<&str>,
) -> AppResult<QaService> {
    let config = config::load_config(workspace, base_name)?;

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' has no index. Run 'docqa ingest' first.",
            base_name
        )));
    }

    let index = open_index(workspace, &config, default_endpoint)?;
    let prompt = docqa_prompt::resolve_prompt(workspace)?;

    QaService::new(index, llm, &config, prompt, model)
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let config = config::load_config(workspace, base_name)?;
    let index = open_index(workspace, &config, None)?;
    index.reset()?;
    SourceRegistry::new(workspace, base_name).clear()?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Remove one ingested document from a knowledge base.
///
/// `path` must match the path the document was ingested under. Returns the
/// number of chunks removed; 0 if no such document was stored.
pub fn remove(workspace: &Path, base_name: &str, path: &Path) -> AppResult<usize> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let path_str = path.display().to_string();
    let config = config::load_config(workspace, base_name)?;
    let index = open_index(workspace, &config, None)?;

    let removed = index.remove_source(&path_str)?;
    let tracked = SourceRegistry::new(workspace, base_name).remove_path(&path_str)?;

    if removed == 0 && tracked == 0 {
        tracing::warn!("No document stored under {} in '{}'", path_str, base_name);
    } else {
        tracing::info!(
            "Removed {} from '{}' ({} chunks)",
            path_str,
            base_name,
            removed
        );
    }

    Ok(removed)
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let config = config::load_config(workspace, base_name)?;
    let index = open_index(workspace, &config, None)?;
    let (documents_count, chunks_count) = index.stats()?;

    let db_size_bytes = std::fs::metadata(&index_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let last_indexed_at = SourceRegistry::new(workspace, base_name)
        .list()?
        .into_iter()
        .map(|s| s.indexed_at)
        .max();

    Ok(BaseStats {
        base_name: base_name.to_string(),
        documents_count,
        chunks_count,
        db_size_bytes,
        last_indexed_at,
    })
}
