//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fallback label for chunks without source metadata.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// A unit of retrievable text, as stored in the index.
///
/// Metadata is optional; consumers fall back to [`UNKNOWN_SOURCE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub content: String,

    /// Originating file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Path of the originating file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Position within the source document, assigned at split time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

impl Chunk {
    /// Create a chunk with content only.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            file_path: None,
            chunk_index: None,
        }
    }

    /// Attach the originating file name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the originating file path.
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Attach the position within the source document.
    pub fn with_chunk_index(mut self, chunk_index: u32) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }
}

/// A candidate chunk with the signals used to rank it for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Raw distance reported by the index (lower is closer)
    pub distance: f32,

    /// Distance mapped into [0, 1]
    pub similarity: f32,

    /// Fraction of query keywords present in the content
    pub keyword_match: f32,

    /// Weighted blend of similarity and keyword match
    pub combined: f32,
}

/// Ranked (chunk, raw distance) pairs returned by retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    items: Vec<(Chunk, f32)>,
}

impl RetrievalResult {
    /// An empty result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The ranked pairs.
    pub fn items(&self) -> &[(Chunk, f32)] {
        &self.items
    }

    /// Chunks in rank order.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.items.iter().map(|(chunk, _)| chunk.clone()).collect()
    }

    /// Raw distances in rank order.
    pub fn distances(&self) -> Vec<f32> {
        self.items.iter().map(|(_, distance)| *distance).collect()
    }

    pub fn into_items(self) -> Vec<(Chunk, f32)> {
        self.items
    }
}

impl From<Vec<(Chunk, f32)>> for RetrievalResult {
    fn from(items: Vec<(Chunk, f32)>) -> Self {
        Self { items }
    }
}

/// Per-factor confidence of an answer, every field in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub best_similarity: f32,
    pub avg_similarity: f32,
    pub consistency: f32,
    pub keyword_match: f32,
    pub final_score: f32,
}

/// Provenance of one retrieved chunk, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source: String,
    pub chunk_index: u32,
    pub file_path: String,
    pub content_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
}

/// Answer to a question, with provenance and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub confidence_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_breakdown: Option<ConfidenceBreakdown>,
    pub similarity_scores: Vec<f32>,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub explain_mode: bool,
}

impl QueryResponse {
    /// A response carrying a fixed message and zero confidence.
    pub fn canned(answer: impl Into<String>, query: &str, explain_mode: bool) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            confidence_score: 0.0,
            confidence_breakdown: None,
            similarity_scores: Vec::new(),
            query: query.to_string(),
            timestamp: Utc::now(),
            explain_mode,
        }
    }
}

/// Retrieval and confidence for a query, without a generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub sources: Vec<SourceInfo>,
    pub confidence_score: f32,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub similarity_scores: Vec<f32>,
}

/// An ingested document (sources.jsonl record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Unique document identifier
    pub source_id: String,

    /// File name
    pub file_name: String,

    /// Path as given at ingestion
    pub path: String,

    /// sha256 of the parsed text
    pub content_hash: String,

    /// When this document was indexed
    pub indexed_at: DateTime<Utc>,

    /// Number of chunks created from this document
    pub chunk_count: u32,

    /// Document size in bytes
    pub byte_count: u64,
}

/// Options for the ingest operation.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Knowledge base name
    pub base_name: String,

    /// Files or directories to ingest
    pub paths: Vec<PathBuf>,

    /// Reset the base before ingesting
    pub reset: bool,
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents_indexed: u32,
    pub documents_skipped: u32,
    pub documents_failed: u32,
    pub chunks_indexed: u32,
    pub bytes_processed: u64,
    pub duration_secs: f64,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    pub base_name: String,
    pub documents_count: u32,
    pub chunks_count: u32,
    pub db_size_bytes: u64,
    pub last_indexed_at: Option<DateTime<Utc>>,
}
