//! Document ingestion: parse, chunk, embed and store.

use crate::chunker::split_document;
use crate::config::{self, KnowledgeBaseConfig};
use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::parser::{parse_file, DocumentKind};
use crate::sources::SourceRegistry;
use crate::sqlite_index::SqliteIndex;
use crate::types::{IngestOptions, IngestStats, KnowledgeSource};
use chrono::Utc;
use docqa_core::AppResult;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
enum FileOutcome {
    Indexed { chunks: u32, bytes: u64 },
    /// Unchanged, duplicate or empty
    Skipped,
}

/// Ingest files and directories into a knowledge base.
///
/// Directories are walked recursively for supported files. A file whose
/// content is already stored is skipped; a changed file replaces its earlier
/// version. Per-file failures are logged and counted, not returned.
pub async fn ingest(
    workspace: &Path,
    options: &IngestOptions,
    default_endpoint: Option<&str>,
) -> AppResult<IngestStats> {
    let start = Instant::now();

    tracing::info!("Starting ingest for base '{}'", options.base_name);

    let config = config::load_config(workspace, &options.base_name)?;
    let index = crate::open_index(workspace, &config, default_endpoint)?;
    let embedder = index.embedder();
    embedder.verify().await?;

    let registry = SourceRegistry::new(workspace, &options.base_name);

    if options.reset {
        tracing::info!("Resetting knowledge base '{}'", options.base_name);
        index.reset()?;
        registry.clear()?;
    }

    let mut stats = IngestStats::default();

    for file in collect_files(&options.paths, &mut stats) {
        match ingest_file(&index, embedder.as_ref(), &registry, &config, &file).await {
            Ok(FileOutcome::Indexed { chunks, bytes }) => {
                stats.documents_indexed += 1;
                stats.chunks_indexed += chunks;
                stats.bytes_processed += bytes;
            }
            Ok(FileOutcome::Skipped) => stats.documents_skipped += 1,
            Err(e) => {
                tracing::warn!("Failed to ingest {:?}: {}", file, e);
                stats.documents_failed += 1;
            }
        }
    }

    config::save_config(workspace, &config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Ingest completed: {} indexed, {} skipped, {} failed, {} chunks, {} bytes in {:.2}s",
        stats.documents_indexed,
        stats.documents_skipped,
        stats.documents_failed,
        stats.chunks_indexed,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Expand the given paths into the files to ingest, in walk order.
///
/// Explicitly named files are kept whatever their type so the parser can
/// report them; directory walks only pick up supported files.
fn collect_files(paths: &[PathBuf], stats: &mut IngestStats) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && DocumentKind::from_path(entry_path).is_ingestible() {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            tracing::warn!("Path not found: {:?}", path);
            stats.documents_failed += 1;
        }
    }

    files
}

async fn ingest_file(
    index: &SqliteIndex,
    embedder: &dyn EmbeddingProvider,
    registry: &SourceRegistry,
    config: &KnowledgeBaseConfig,
    path: &Path,
) -> AppResult<FileOutcome> {
    tracing::debug!("Processing file: {:?}", path);

    let text = parse_file(path)?;
    let content_hash = calculate_hash(&text);
    let path_str = path.display().to_string();

    if let Some(existing) = index.find_by_hash(&content_hash)? {
        if existing == path_str {
            tracing::debug!("Unchanged, skipping: {}", path_str);
        } else {
            // An earlier version of this path would otherwise stay searchable.
            let removed = index.remove_source(&path_str)?;
            registry.remove_path(&path_str)?;
            tracing::info!(
                "Same content already indexed from {}, skipping {} ({} stale chunks removed)",
                existing,
                path_str,
                removed
            );
        }
        return Ok(FileOutcome::Skipped);
    }

    let chunks = split_document(
        &text,
        path,
        config.chunk_size as usize,
        config.chunk_overlap as usize,
    )?;

    if chunks.is_empty() {
        tracing::warn!("No text extracted from {}, skipping", path_str);
        return Ok(FileOutcome::Skipped);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embed_in_batches(embedder, &texts, config.embedding.batch_size).await?;

    let bytes = text.len() as u64;
    let source = KnowledgeSource {
        source_id: uuid::Uuid::new_v4().to_string(),
        file_name: chunks[0]
            .source
            .clone()
            .unwrap_or_else(|| path_str.clone()),
        path: path_str.clone(),
        content_hash,
        indexed_at: Utc::now(),
        chunk_count: chunks.len() as u32,
        byte_count: bytes,
    };

    index.add_document(&source, &chunks, &embeddings)?;
    registry.remove_path(&path_str)?;
    registry.track(&source)?;

    tracing::debug!("Indexed {}: {} chunks, {} bytes", path_str, chunks.len(), bytes);

    Ok(FileOutcome::Indexed {
        chunks: chunks.len() as u32,
        bytes,
    })
}

/// SHA-256 of text, hex encoded.
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
